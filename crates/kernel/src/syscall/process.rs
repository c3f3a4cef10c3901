use std::sync::Arc;

use loader::{LoadError, ProgramImage};
use log::{error, info};
use types::{Errno, Signal};
use vm::registers::Register;
use vm::{AddressSpace, Trap, CPU};

use super::{efault, Reply, SysResult};
use crate::files::{Target, Vfs};
use crate::process::{ExitStatus, Process};
use crate::task::Task;

const WNOHANG: u32 = 1;

impl Task {
    /// The child resumes after the syscall with v0 = 0; the parent gets
    /// the child's pid.
    pub(super) fn sys_fork(&mut self, cpu: &CPU, memory: &AddressSpace) -> SysResult {
        let state = self.signals.lock().fork();
        let registry = Arc::clone(self.registry());
        let (child, signals) = registry.register(Some(self.pid()), self.name(), state);

        let mut child_cpu = cpu.clone();
        child_cpu.set_reg(Register::V0, 0);
        child_cpu.set_reg(Register::A3, 0);
        let process = Process::new(child_cpu, memory.fork(), self.fork(child, signals));
        if let Err(err) = process.start() {
            error!("pid {}: fork failed: {}", self.pid(), err);
            registry.exit(child, ExitStatus::Crashed);
            return Err(Errno::EAGAIN);
        }
        info!("pid {}: forked pid {}", self.pid(), child);
        Ok(Reply::Value(child))
    }

    /// waitpid and wait4; rusage is not filled.
    pub(super) fn sys_wait4(&mut self, memory: &mut AddressSpace, pid: u32, status: u32, options: u32) -> SysResult {
        let nohang = options & WNOHANG != 0;
        let reaped = self
            .registry()
            .wait_child(self.pid(), pid as i32, nohang, &self.signals)?;
        match reaped {
            None => Ok(Reply::Value(0)),
            Some((child, exit)) => {
                if status != 0 {
                    memory.store_word(status, exit.wait_status()).map_err(efault)?;
                }
                info!("pid {}: reaped pid {} ({})", self.pid(), child, exit);
                Ok(Reply::Value(child))
            }
        }
    }

    /// Everything execve needs, gathered before anything is torn down.
    fn exec_args(&self, memory: &AddressSpace, args: [u32; 6]) -> Result<(ProgramImage, Vec<String>, Vec<String>), Errno> {
        let path = memory.load_string(args[0]).map_err(efault)?;
        let argv = if args[1] == 0 {
            Vec::new()
        } else {
            memory.load_string_array(args[1]).map_err(efault)?
        };
        let envp = if args[2] == 0 {
            Vec::new()
        } else {
            memory.load_string_array(args[2]).map_err(efault)?
        };

        let host = match self.vfs.resolve(self.files.cwd(), &path)? {
            Target::Host(host) => host,
            Target::Device(_) => return Err(Errno::EACCES),
        };
        let image = loader::load_elf(&host).map_err(|err| {
            info!("pid {}: execve {}: {}", self.pid(), path, err);
            match err {
                LoadError::Io { source, .. } => Errno::from(source),
                _ => Errno::ENOEXEC,
            }
        })?;
        info!("pid {}: execve {} {:?}", self.pid(), Vfs::normalize(self.files.cwd(), &path), argv);
        Ok((image, argv, envp))
    }

    /// A failure to read or load leaves the old image running. Once the
    /// new image starts loading there is nothing to go back to.
    pub(super) fn sys_execve(&mut self, cpu: &mut CPU, memory: &mut AddressSpace, args: [u32; 6]) -> Result<SysResult, Trap> {
        let (image, argv, envp) = match self.exec_args(memory, args) {
            Ok(loaded) => loaded,
            Err(errno) => return Ok(Err(errno)),
        };
        self.exec(cpu, memory, &image, &argv, &envp)?;
        Ok(Ok(Reply::Unchanged))
    }

    pub(super) fn sys_kill(&mut self, pid: i32, sig: u32) -> SysResult {
        if let Some(sig) = Signal::from_number(sig) {
            info!("pid {}: kill({}, {})", self.pid(), pid, sig);
        }
        self.registry().kill(self.pid(), pid, sig)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_setpgid(&mut self, pid: u32, pgid: u32) -> SysResult {
        self.registry().setpgid(self.pid(), pid, pgid)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_getsid(&mut self, pid: u32) -> SysResult {
        let pid = if pid == 0 { self.pid() } else { pid };
        self.registry().getsid(pid).map(Reply::Value)
    }
}
