//! Syscall dispatch for the o32 convention.
//!
//! `v0` holds `4000 + n`; arguments 1-4 are in a0-a3 and 5-6 at sp+16 and
//! sp+20. Handlers return `Result<Reply, Errno>`; [`complete`] alone turns
//! that into `v0`/`a3`. Calls that end the process (exit, a failed signal
//! restore, a failed exec past the point of no return) come back as a
//! `Trap` instead.

mod alloc;
mod file;
mod fs;
mod misc;
mod process;
mod signal;
mod socket;
pub mod structs;

use log::{log, warn, Level};
use types::syscall::*;
use types::Errno;
use vm::registers::Register;
use vm::{AddressSpace, MemoryError, Trap, CPU};

use crate::task::Task;

/// What a successful call leaves in the registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Value(u32),
    /// v0 and v1, as pipe returns its two descriptors.
    Pair(u32, u32),
    /// Registers were replaced wholesale (sigreturn, execve).
    Unchanged,
}

pub type SysResult = Result<Reply, Errno>;

/// Guest pointers that do not resolve are the guest's problem.
pub(crate) fn efault(_: MemoryError) -> Errno {
    Errno::EFAULT
}

fn value(v: u32) -> SysResult {
    Ok(Reply::Value(v))
}

/// Gather the arguments of call `nr`. Stack words are only read for calls
/// that take more than four.
pub fn read_args(cpu: &CPU, memory: &AddressSpace, nr: u32) -> Result<[u32; 6], Errno> {
    let count = syscall_info(nr).map_or(4, |info| info.args);
    let mut args = [0u32; 6];
    for (i, reg) in [Register::A0, Register::A1, Register::A2, Register::A3]
        .into_iter()
        .enumerate()
    {
        args[i] = cpu.reg(reg);
    }
    let sp = cpu.reg(Register::Sp);
    for i in 4..count.min(6) {
        args[i] = memory.load_word(sp.wrapping_add(16 + 4 * (i as u32 - 4))).map_err(efault)?;
    }
    Ok(args)
}

/// Apply the return convention.
pub fn complete(cpu: &mut CPU, result: SysResult) {
    match result {
        Ok(Reply::Value(v)) => {
            cpu.set_reg(Register::V0, v);
            cpu.set_reg(Register::A3, 0);
        }
        Ok(Reply::Pair(v0, v1)) => {
            cpu.set_reg(Register::V0, v0);
            cpu.set_reg(Register::V1, v1);
            cpu.set_reg(Register::A3, 0);
        }
        Ok(Reply::Unchanged) => {}
        Err(errno) => {
            cpu.set_reg(Register::V0, errno.code());
            cpu.set_reg(Register::A3, 1);
        }
    }
}

impl Task {
    fn trace_level(&self) -> Level {
        if self.registry().config().syscall_trace {
            Level::Info
        } else {
            Level::Trace
        }
    }

    pub(crate) fn dispatch(
        &mut self,
        cpu: &mut CPU,
        memory: &mut AddressSpace,
        nr: u32,
        args: [u32; 6],
    ) -> Result<SysResult, Trap> {
        let level = self.trace_level();
        let info = syscall_info(nr);
        if log::log_enabled!(level) {
            let shown = info.map_or(0, |i| i.args).min(6);
            let list: Vec<String> = args[..shown].iter().map(|a| format!("0x{a:x}")).collect();
            let name = info.map_or("?", |i| i.name);
            log!(level, "pid {}: {}({})", self.pid(), name, list.join(", "));
        }

        let result = match nr {
            SYSCALL_SYSCALL => {
                let inner = args[0].wrapping_sub(SYSCALL_BASE);
                if inner == SYSCALL_SYSCALL {
                    return Ok(Err(Errno::ENOSYS));
                }
                let sp = cpu.reg(Register::Sp);
                let sixth = match memory.load_word(sp.wrapping_add(24)) {
                    Ok(word) => word,
                    Err(err) => return Ok(Err(efault(err))),
                };
                let shifted = [args[1], args[2], args[3], args[4], args[5], sixth];
                return self.dispatch(cpu, memory, inner, shifted);
            }
            SYSCALL_EXIT | SYSCALL_EXIT_GROUP => return Err(Trap::Exit(args[0] as u8)),
            SYSCALL_FORK => self.sys_fork(cpu, memory),
            SYSCALL_WAITPID => self.sys_wait4(memory, args[0], args[1], args[2]),
            SYSCALL_WAIT4 => self.sys_wait4(memory, args[0], args[1], args[2]),
            SYSCALL_EXECVE => self.sys_execve(cpu, memory, args)?,
            SYSCALL_KILL => self.sys_kill(args[0] as i32, args[1]),
            SYSCALL_GETPID => value(self.pid()),
            SYSCALL_GETPPID => value(self.registry().getppid(self.pid())),
            SYSCALL_GETPGRP => self.registry().getpgid(self.pid()).map(Reply::Value),
            SYSCALL_SETPGID => self.sys_setpgid(args[0], args[1]),
            SYSCALL_SETSID => self.registry().setsid(self.pid()).map(Reply::Value),
            SYSCALL_GETSID => self.sys_getsid(args[0]),
            SYSCALL_GETUID | SYSCALL_GETEUID | SYSCALL_GETGID | SYSCALL_GETEGID => value(0),
            SYSCALL_SETUID => value(0),

            SYSCALL_SIGNAL => self.sys_signal(args[0], args[1]),
            SYSCALL_SIGACTION | SYSCALL_RT_SIGACTION => {
                self.sys_sigaction(memory, args[0], args[1], args[2])
            }
            SYSCALL_SIGPROCMASK | SYSCALL_RT_SIGPROCMASK => {
                self.sys_sigprocmask(memory, args[0], args[1], args[2])
            }
            SYSCALL_SIGRETURN | SYSCALL_RT_SIGRETURN => self.sys_sigreturn(cpu, memory)?,

            SYSCALL_OPEN => self.sys_open(memory, args[0], args[1], args[2]),
            SYSCALL_CREAT => {
                self.sys_open(memory, args[0], 1 | file::O_CREAT | file::O_TRUNC, args[1])
            }
            SYSCALL_CLOSE => self.files.close(args[0]).map(|()| Reply::Value(0)),
            SYSCALL_READ => self.sys_read(memory, args[0], args[1], args[2]),
            SYSCALL_WRITE => self.sys_write(memory, args[0], args[1], args[2]),
            SYSCALL_WRITEV => self.sys_writev(memory, args[0], args[1], args[2]),
            SYSCALL_LSEEK => self.sys_lseek(args[0], args[1] as i32 as i64, args[2]),
            SYSCALL_LLSEEK => self.sys_llseek(memory, args),
            SYSCALL_DUP => self.sys_dup(args[0]),
            SYSCALL_DUP2 => self.sys_dup2(args[0], args[1]),
            SYSCALL_FCNTL | SYSCALL_FCNTL64 => self.sys_fcntl(args[0], args[1], args[2]),
            SYSCALL_PIPE => self.sys_pipe(),
            SYSCALL_GETDENTS => self.sys_getdents(memory, args[0], args[1], args[2], false),
            SYSCALL_GETDENTS64 => self.sys_getdents(memory, args[0], args[1], args[2], true),
            SYSCALL_FSTAT => self.sys_fstat(memory, args[0], args[1], false),
            SYSCALL_FSTAT64 => self.sys_fstat(memory, args[0], args[1], true),
            SYSCALL_IOCTL => self.sys_ioctl(memory, args[0], args[1], args[2]),
            SYSCALL_NEWSELECT => self.sys_select(memory, args),

            SYSCALL_STAT => self.sys_stat(memory, args[0], args[1], true, false),
            SYSCALL_LSTAT => self.sys_stat(memory, args[0], args[1], false, false),
            SYSCALL_STAT64 => self.sys_stat(memory, args[0], args[1], true, true),
            SYSCALL_LSTAT64 => self.sys_stat(memory, args[0], args[1], false, true),
            SYSCALL_STATFS => self.sys_statfs(memory, args[0], args[1], false),
            SYSCALL_STATFS64 => self.sys_statfs(memory, args[0], args[2], true),
            SYSCALL_FSTATFS => self.sys_fstatfs(memory, args[0], args[1], false),
            SYSCALL_FSTATFS64 => self.sys_fstatfs(memory, args[0], args[2], true),
            SYSCALL_ACCESS => self.sys_access(memory, args[0], args[1]),
            SYSCALL_MKDIR => self.sys_mkdir(memory, args[0], args[1]),
            SYSCALL_RMDIR => self.sys_rmdir(memory, args[0]),
            SYSCALL_UNLINK => self.sys_unlink(memory, args[0]),
            SYSCALL_LINK => self.sys_link(memory, args[0], args[1], false),
            SYSCALL_SYMLINK => self.sys_link(memory, args[0], args[1], true),
            SYSCALL_RENAME => self.sys_rename(memory, args[0], args[1]),
            SYSCALL_READLINK => self.sys_readlink(memory, args[0], args[1], args[2]),
            SYSCALL_CHDIR => self.sys_chdir(memory, args[0]),
            SYSCALL_GETCWD => self.sys_getcwd(memory, args[0], args[1]),
            SYSCALL_CHMOD => self.sys_chmod(memory, args[0], args[1]),
            SYSCALL_UMASK => value(self.files.set_umask(args[0])),
            SYSCALL_SYNC => value(0),
            SYSCALL_MOUNT => Err(Errno::EPERM),

            SYSCALL_BRK => self.sys_brk(memory, args[0]),
            SYSCALL_MMAP => self.sys_mmap(memory, args),
            SYSCALL_MUNMAP => self.sys_munmap(memory, args[0], args[1]),

            SYSCALL_SOCKET => self.sys_socket(args[0], args[1], args[2]),
            SYSCALL_BIND => self.sys_bind(memory, args[0], args[1], args[2]),
            SYSCALL_CONNECT => self.sys_connect(memory, args[0], args[1], args[2]),
            SYSCALL_LISTEN => self.sys_listen(args[0]),
            SYSCALL_ACCEPT => self.sys_accept(memory, args[0], args[1], args[2]),
            SYSCALL_SETSOCKOPT => self.sys_setsockopt(args),

            SYSCALL_TIME => self.sys_time(memory, args[0]),
            SYSCALL_GETTIMEOFDAY => self.sys_gettimeofday(memory, args[0]),
            SYSCALL_NANOSLEEP => self.sys_nanosleep(memory, args[0], args[1]),
            SYSCALL_UNAME => self.sys_uname(memory, args[0]),

            _ => {
                warn!("pid {}: unimplemented syscall {}", self.pid(), nr);
                Err(Errno::ENOSYS)
            }
        };

        match &result {
            Ok(Reply::Value(v)) => log!(level, "pid {}: = 0x{:x}", self.pid(), v),
            Ok(Reply::Pair(a, b)) => log!(level, "pid {}: = 0x{:x}, 0x{:x}", self.pid(), a, b),
            Ok(Reply::Unchanged) => {}
            Err(errno) => log!(level, "pid {}: = -1 {:?} ({})", self.pid(), errno, errno),
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm::memory::STACK_TOP;
    use vm::PageAllocator;

    #[test]
    fn stack_arguments_only_for_long_calls() {
        let mut memory = AddressSpace::new(PageAllocator::new());
        memory.alloc(STACK_TOP - 0x1_0000, 0x1_0000).unwrap();
        let mut cpu = CPU::new();
        cpu.reset(0, STACK_TOP - 64);
        cpu.set_reg(Register::A0, 1);
        cpu.set_reg(Register::A3, 4);
        memory.store_words(STACK_TOP - 48, &[5, 6]).unwrap();

        assert_eq!(read_args(&cpu, &memory, SYSCALL_MMAP), Ok([1, 0, 0, 4, 5, 6]));
        assert_eq!(read_args(&cpu, &memory, SYSCALL_WRITE), Ok([1, 0, 0, 4, 0, 0]));

        cpu.set_reg(Register::Sp, 0x10);
        assert_eq!(read_args(&cpu, &memory, SYSCALL_MMAP), Err(Errno::EFAULT));
    }

    #[test]
    fn return_convention() {
        let mut cpu = CPU::new();
        complete(&mut cpu, Ok(Reply::Value(5)));
        assert_eq!((cpu.reg(Register::V0), cpu.reg(Register::A3)), (5, 0));
        complete(&mut cpu, Err(Errno::EBADF));
        assert_eq!((cpu.reg(Register::V0), cpu.reg(Register::A3)), (9, 1));
        complete(&mut cpu, Ok(Reply::Pair(3, 4)));
        assert_eq!(
            (cpu.reg(Register::V0), cpu.reg(Register::V1), cpu.reg(Register::A3)),
            (3, 4, 0)
        );
        complete(&mut cpu, Ok(Reply::Unchanged));
        assert_eq!(cpu.reg(Register::V0), 3);
    }
}
