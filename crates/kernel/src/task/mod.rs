//! Kernel side of one process: identity, descriptors and signal state.
//!
//! The engine owns the registers and memory; a `Task` is handed to it as
//! the syscall handler and sees both at every trap.

pub mod prep;

use std::sync::Arc;

use loader::ProgramImage;
use log::{info, warn};
use types::syscall::SYSCALL_BASE;
use types::{DefaultAction, Signal};
use vm::registers::Register;
use vm::{AddressSpace, SymbolTable, SyscallHandler, Trap, CPU};

use crate::config::Strategy;
use crate::error::KernelError;
use crate::files::{FileTable, Vfs};
use crate::process::program_name;
use crate::registry::{Pid, Registry};
use crate::signal::{invoke_handler, Disposition, Signals};
use crate::syscall;

pub use prep::load_image;

pub struct Task {
    pid: Pid,
    name: String,
    registry: Arc<Registry>,
    pub(crate) signals: Arc<Signals>,
    pub(crate) files: FileTable,
    pub(crate) vfs: Vfs,
    symbols: SymbolTable,
    trampoline: u32,
}

impl Task {
    /// A task with the registry's stdio on descriptors 0-2 and no image.
    pub fn new(pid: Pid, registry: Arc<Registry>, signals: Arc<Signals>) -> Self {
        let config = registry.config();
        let files = FileTable::with_stdio(&config.stdio);
        let vfs = Vfs::new(config.root.clone());
        Self {
            pid,
            name: registry.name(pid).unwrap_or_default(),
            registry,
            signals,
            files,
            vfs,
            symbols: SymbolTable::new(),
            trampoline: 0,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn signals(&self) -> &Arc<Signals> {
        &self.signals
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn close_files(&mut self) {
        self.files.close_all();
    }

    /// Install `image` with fresh registers and stack. Breakpoints come
    /// from the config and from a `bp=` entry in the environment.
    pub fn load(
        &mut self,
        cpu: &mut CPU,
        memory: &mut AddressSpace,
        image: &ProgramImage,
        argv: &[String],
        envp: &[String],
    ) -> Result<(), KernelError> {
        let config = self.registry.config();
        self.trampoline = load_image(cpu, memory, image, argv, envp, config.stack_size)?;
        self.symbols = image.symbols.clone();
        self.name = program_name(argv);

        let from_env = envp.iter().find_map(|var| var.strip_prefix("bp="));
        let names = config
            .breakpoints
            .iter()
            .map(String::as_str)
            .chain(from_env.into_iter().flat_map(|list| list.split(',')));
        for name in cpu.funlog.set_breakpoints(names, &self.symbols) {
            warn!("pid {}: no function {} for breakpoint", self.pid, name);
        }
        Ok(())
    }

    /// The task a forked child starts with.
    pub(crate) fn fork(&self, pid: Pid, signals: Arc<Signals>) -> Self {
        Self {
            pid,
            name: self.name.clone(),
            registry: Arc::clone(&self.registry),
            signals,
            files: self.files.clone(),
            vfs: self.vfs.clone(),
            symbols: self.symbols.clone(),
            trampoline: self.trampoline,
        }
    }

    /// Replace the image for execve. Handlers go back to default and
    /// close-on-exec descriptors are dropped; the pid stays.
    pub(crate) fn exec(
        &mut self,
        cpu: &mut CPU,
        memory: &mut AddressSpace,
        image: &ProgramImage,
        argv: &[String],
        envp: &[String],
    ) -> Result<(), KernelError> {
        self.signals.lock().exec();
        self.files.close_on_exec();
        self.load(cpu, memory, image, argv, envp)?;
        self.registry.rename(self.pid, &self.name);
        Ok(())
    }

    /// Take pending signals until one needs the guest or none are left.
    ///
    /// A handler gets a frame and control; a default action may end the
    /// process or stop it until CONT arrives.
    pub(crate) fn service_signals(&mut self, cpu: &mut CPU, memory: &mut AddressSpace) -> Result<(), Trap> {
        loop {
            let next = self.signals.lock().take_deliverable();
            let Some((sig, action)) = next else {
                return Ok(());
            };
            match action.disposition {
                Disposition::Handler(handler) => {
                    let saved = self.signals.lock().set_mask(action.mask);
                    info!("pid {}: invoking handler 0x{:08x} for {}", self.pid, handler, sig);
                    invoke_handler(cpu, memory, sig, handler, saved, self.trampoline)?;
                    if self.registry.config().strategy == Strategy::Instrumented {
                        cpu.funlog.call(handler, cpu.reg(Register::Sp));
                    }
                    return Ok(());
                }
                Disposition::Ignore => {}
                Disposition::Default => match sig.default_action() {
                    DefaultAction::Terminate | DefaultAction::Abort => {
                        warn!("pid {}: exiting on {}", self.pid, sig);
                        return Err(Trap::Killed(sig));
                    }
                    DefaultAction::Stop => {
                        if let Err(fatal) = self.signals.stop_wait(sig, action.mask) {
                            warn!("pid {}: killed while stopped", self.pid);
                            return Err(Trap::Killed(fatal));
                        }
                    }
                    DefaultAction::Continue | DefaultAction::Ignore => {}
                },
            }
        }
    }

    /// Raise `sig` on this process from inside a syscall.
    pub(crate) fn raise_self(&self, sig: Signal) {
        self.signals.raise(sig, true);
    }
}

impl SyscallHandler for Task {
    fn handle_syscall(&mut self, cpu: &mut CPU, memory: &mut AddressSpace) -> Result<(), Trap> {
        let nr = cpu.reg(Register::V0).wrapping_sub(SYSCALL_BASE);
        let result = match syscall::read_args(cpu, memory, nr) {
            Ok(args) => self.dispatch(cpu, memory, nr, args)?,
            Err(errno) => Err(errno),
        };
        syscall::complete(cpu, result);
        Ok(())
    }

    fn after_syscall(&mut self, cpu: &mut CPU, memory: &mut AddressSpace) -> Result<(), Trap> {
        self.service_signals(cpu, memory)
    }

    fn symbols(&self) -> Option<&SymbolTable> {
        Some(&self.symbols)
    }
}
