//! Syscall numbers of the o32 ABI, relative to [`SYSCALL_BASE`].

/// `v0` holds `SYSCALL_BASE + n` at the trap.
pub const SYSCALL_BASE: u32 = 4000;

pub const SYSCALL_SYSCALL: u32 = 0;
pub const SYSCALL_EXIT: u32 = 1;
pub const SYSCALL_FORK: u32 = 2;
pub const SYSCALL_READ: u32 = 3;
pub const SYSCALL_WRITE: u32 = 4;
pub const SYSCALL_OPEN: u32 = 5;
pub const SYSCALL_CLOSE: u32 = 6;
pub const SYSCALL_WAITPID: u32 = 7;
pub const SYSCALL_CREAT: u32 = 8;
pub const SYSCALL_LINK: u32 = 9;
pub const SYSCALL_UNLINK: u32 = 10;
pub const SYSCALL_EXECVE: u32 = 11;
pub const SYSCALL_CHDIR: u32 = 12;
pub const SYSCALL_TIME: u32 = 13;
pub const SYSCALL_CHMOD: u32 = 15;
pub const SYSCALL_LSEEK: u32 = 19;
pub const SYSCALL_GETPID: u32 = 20;
pub const SYSCALL_MOUNT: u32 = 21;
pub const SYSCALL_SETUID: u32 = 23;
pub const SYSCALL_GETUID: u32 = 24;
pub const SYSCALL_ACCESS: u32 = 33;
pub const SYSCALL_SYNC: u32 = 36;
pub const SYSCALL_KILL: u32 = 37;
pub const SYSCALL_RENAME: u32 = 38;
pub const SYSCALL_MKDIR: u32 = 39;
pub const SYSCALL_RMDIR: u32 = 40;
pub const SYSCALL_DUP: u32 = 41;
pub const SYSCALL_PIPE: u32 = 42;
pub const SYSCALL_BRK: u32 = 45;
pub const SYSCALL_GETGID: u32 = 47;
pub const SYSCALL_GETEUID: u32 = 49;
pub const SYSCALL_GETEGID: u32 = 50;
pub const SYSCALL_IOCTL: u32 = 54;
pub const SYSCALL_FCNTL: u32 = 55;
pub const SYSCALL_SIGNAL: u32 = 56;
pub const SYSCALL_SETPGID: u32 = 57;
pub const SYSCALL_UMASK: u32 = 60;
pub const SYSCALL_DUP2: u32 = 63;
pub const SYSCALL_GETPPID: u32 = 64;
pub const SYSCALL_GETPGRP: u32 = 65;
pub const SYSCALL_SETSID: u32 = 66;
pub const SYSCALL_SIGACTION: u32 = 67;
pub const SYSCALL_GETTIMEOFDAY: u32 = 78;
pub const SYSCALL_SYMLINK: u32 = 83;
pub const SYSCALL_READLINK: u32 = 85;
pub const SYSCALL_MMAP: u32 = 90;
pub const SYSCALL_MUNMAP: u32 = 91;
pub const SYSCALL_STATFS: u32 = 99;
pub const SYSCALL_FSTATFS: u32 = 100;
pub const SYSCALL_STAT: u32 = 106;
pub const SYSCALL_LSTAT: u32 = 107;
pub const SYSCALL_FSTAT: u32 = 108;
pub const SYSCALL_WAIT4: u32 = 114;
/// The restore trap executed by the signal trampoline.
pub const SYSCALL_SIGRETURN: u32 = 119;
pub const SYSCALL_UNAME: u32 = 122;
pub const SYSCALL_SIGPROCMASK: u32 = 126;
pub const SYSCALL_LLSEEK: u32 = 140;
pub const SYSCALL_GETDENTS: u32 = 141;
pub const SYSCALL_NEWSELECT: u32 = 142;
pub const SYSCALL_WRITEV: u32 = 146;
pub const SYSCALL_GETSID: u32 = 151;
pub const SYSCALL_NANOSLEEP: u32 = 166;
pub const SYSCALL_ACCEPT: u32 = 168;
pub const SYSCALL_BIND: u32 = 169;
pub const SYSCALL_CONNECT: u32 = 170;
pub const SYSCALL_LISTEN: u32 = 174;
pub const SYSCALL_SETSOCKOPT: u32 = 181;
pub const SYSCALL_SOCKET: u32 = 183;
pub const SYSCALL_RT_SIGRETURN: u32 = 193;
pub const SYSCALL_RT_SIGACTION: u32 = 194;
pub const SYSCALL_RT_SIGPROCMASK: u32 = 195;
pub const SYSCALL_GETCWD: u32 = 203;
pub const SYSCALL_STAT64: u32 = 213;
pub const SYSCALL_LSTAT64: u32 = 214;
pub const SYSCALL_FSTAT64: u32 = 215;
pub const SYSCALL_GETDENTS64: u32 = 219;
pub const SYSCALL_FCNTL64: u32 = 220;
pub const SYSCALL_EXIT_GROUP: u32 = 246;
pub const SYSCALL_STATFS64: u32 = 255;
pub const SYSCALL_FSTATFS64: u32 = 256;

/// Name and argument count of a syscall, for traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallInfo {
    pub name: &'static str,
    pub args: usize,
}

const fn info(name: &'static str, args: usize) -> Option<SyscallInfo> {
    Some(SyscallInfo { name, args })
}

/// Look up a relative syscall number.
pub fn syscall_info(nr: u32) -> Option<SyscallInfo> {
    match nr {
        SYSCALL_SYSCALL => info("syscall", 6),
        SYSCALL_EXIT => info("exit", 1),
        SYSCALL_FORK => info("fork", 0),
        SYSCALL_READ => info("read", 3),
        SYSCALL_WRITE => info("write", 3),
        SYSCALL_OPEN => info("open", 3),
        SYSCALL_CLOSE => info("close", 1),
        SYSCALL_WAITPID => info("waitpid", 3),
        SYSCALL_CREAT => info("creat", 2),
        SYSCALL_LINK => info("link", 2),
        SYSCALL_UNLINK => info("unlink", 1),
        SYSCALL_EXECVE => info("execve", 3),
        SYSCALL_CHDIR => info("chdir", 1),
        SYSCALL_TIME => info("time", 1),
        SYSCALL_CHMOD => info("chmod", 2),
        SYSCALL_LSEEK => info("lseek", 3),
        SYSCALL_GETPID => info("getpid", 0),
        SYSCALL_MOUNT => info("mount", 5),
        SYSCALL_SETUID => info("setuid", 1),
        SYSCALL_GETUID => info("getuid", 0),
        SYSCALL_ACCESS => info("access", 2),
        SYSCALL_SYNC => info("sync", 0),
        SYSCALL_KILL => info("kill", 2),
        SYSCALL_RENAME => info("rename", 2),
        SYSCALL_MKDIR => info("mkdir", 2),
        SYSCALL_RMDIR => info("rmdir", 1),
        SYSCALL_DUP => info("dup", 1),
        SYSCALL_PIPE => info("pipe", 1),
        SYSCALL_BRK => info("brk", 1),
        SYSCALL_GETGID => info("getgid", 0),
        SYSCALL_GETEUID => info("geteuid", 0),
        SYSCALL_GETEGID => info("getegid", 0),
        SYSCALL_IOCTL => info("ioctl", 3),
        SYSCALL_FCNTL => info("fcntl", 3),
        SYSCALL_SIGNAL => info("signal", 2),
        SYSCALL_SETPGID => info("setpgid", 2),
        SYSCALL_UMASK => info("umask", 1),
        SYSCALL_DUP2 => info("dup2", 2),
        SYSCALL_GETPPID => info("getppid", 0),
        SYSCALL_GETPGRP => info("getpgrp", 0),
        SYSCALL_SETSID => info("setsid", 0),
        SYSCALL_SIGACTION => info("sigaction", 3),
        SYSCALL_GETTIMEOFDAY => info("gettimeofday", 2),
        SYSCALL_SYMLINK => info("symlink", 2),
        SYSCALL_READLINK => info("readlink", 3),
        SYSCALL_MMAP => info("mmap", 6),
        SYSCALL_MUNMAP => info("munmap", 2),
        SYSCALL_STATFS => info("statfs", 2),
        SYSCALL_FSTATFS => info("fstatfs", 2),
        SYSCALL_STAT => info("stat", 2),
        SYSCALL_LSTAT => info("lstat", 2),
        SYSCALL_FSTAT => info("fstat", 2),
        SYSCALL_WAIT4 => info("wait4", 4),
        SYSCALL_SIGRETURN => info("sigreturn", 0),
        SYSCALL_UNAME => info("uname", 1),
        SYSCALL_SIGPROCMASK => info("sigprocmask", 3),
        SYSCALL_LLSEEK => info("_llseek", 5),
        SYSCALL_GETDENTS => info("getdents", 3),
        SYSCALL_NEWSELECT => info("_newselect", 5),
        SYSCALL_WRITEV => info("writev", 3),
        SYSCALL_GETSID => info("getsid", 1),
        SYSCALL_NANOSLEEP => info("nanosleep", 2),
        SYSCALL_ACCEPT => info("accept", 3),
        SYSCALL_BIND => info("bind", 3),
        SYSCALL_CONNECT => info("connect", 3),
        SYSCALL_LISTEN => info("listen", 2),
        SYSCALL_SETSOCKOPT => info("setsockopt", 5),
        SYSCALL_SOCKET => info("socket", 3),
        SYSCALL_RT_SIGRETURN => info("rt_sigreturn", 0),
        SYSCALL_RT_SIGACTION => info("rt_sigaction", 4),
        SYSCALL_RT_SIGPROCMASK => info("rt_sigprocmask", 4),
        SYSCALL_GETCWD => info("getcwd", 2),
        SYSCALL_STAT64 => info("stat64", 2),
        SYSCALL_LSTAT64 => info("lstat64", 2),
        SYSCALL_FSTAT64 => info("fstat64", 2),
        SYSCALL_GETDENTS64 => info("getdents64", 3),
        SYSCALL_FCNTL64 => info("fcntl64", 3),
        SYSCALL_EXIT_GROUP => info("exit_group", 1),
        SYSCALL_STATFS64 => info("statfs64", 3),
        SYSCALL_FSTATFS64 => info("fstatfs64", 3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_arity() {
        assert_eq!(syscall_info(SYSCALL_MMAP), Some(SyscallInfo { name: "mmap", args: 6 }));
        assert_eq!(syscall_info(SYSCALL_SIGRETURN).map(|i| i.name), Some("sigreturn"));
        assert_eq!(syscall_info(14), None);
    }
}
