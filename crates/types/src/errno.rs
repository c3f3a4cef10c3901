//! Guest-visible error codes.
//!
//! Values follow the MIPS Linux numbering, which departs from the generic
//! table above 34. A syscall that fails places the positive code in `v0` and
//! sets `a3`, so these never cross the syscall boundary as anything but a
//! number.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::io;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, thiserror::Error)]
#[repr(u32)]
pub enum Errno {
    #[error("Operation not permitted")]
    EPERM = 1,
    #[error("No such file or directory")]
    ENOENT = 2,
    #[error("No such process")]
    ESRCH = 3,
    #[error("Interrupted system call")]
    EINTR = 4,
    #[error("Input/output error")]
    EIO = 5,
    #[error("No such device or address")]
    ENXIO = 6,
    #[error("Argument list too long")]
    E2BIG = 7,
    #[error("Exec format error")]
    ENOEXEC = 8,
    #[error("Bad file descriptor")]
    EBADF = 9,
    #[error("No child processes")]
    ECHILD = 10,
    #[error("Resource temporarily unavailable")]
    EAGAIN = 11,
    #[error("Cannot allocate memory")]
    ENOMEM = 12,
    #[error("Permission denied")]
    EACCES = 13,
    #[error("Bad address")]
    EFAULT = 14,
    #[error("Device or resource busy")]
    EBUSY = 16,
    #[error("File exists")]
    EEXIST = 17,
    #[error("Invalid cross-device link")]
    EXDEV = 18,
    #[error("No such device")]
    ENODEV = 19,
    #[error("Not a directory")]
    ENOTDIR = 20,
    #[error("Is a directory")]
    EISDIR = 21,
    #[error("Invalid argument")]
    EINVAL = 22,
    #[error("Too many open files in system")]
    ENFILE = 23,
    #[error("Too many open files")]
    EMFILE = 24,
    #[error("Inappropriate ioctl for device")]
    ENOTTY = 25,
    #[error("File too large")]
    EFBIG = 27,
    #[error("No space left on device")]
    ENOSPC = 28,
    #[error("Illegal seek")]
    ESPIPE = 29,
    #[error("Read-only file system")]
    EROFS = 30,
    #[error("Too many links")]
    EMLINK = 31,
    #[error("Broken pipe")]
    EPIPE = 32,
    #[error("Numerical argument out of domain")]
    EDOM = 33,
    #[error("Numerical result out of range")]
    ERANGE = 34,
    #[error("File name too long")]
    ENAMETOOLONG = 78,
    #[error("Function not implemented")]
    ENOSYS = 89,
    #[error("Too many levels of symbolic links")]
    ELOOP = 90,
    #[error("Directory not empty")]
    ENOTEMPTY = 93,
    #[error("Socket operation on non-socket")]
    ENOTSOCK = 95,
    #[error("Protocol not supported")]
    EPROTONOSUPPORT = 120,
    #[error("Operation not supported")]
    EOPNOTSUPP = 122,
    #[error("Address family not supported by protocol")]
    EAFNOSUPPORT = 124,
    #[error("Address already in use")]
    EADDRINUSE = 125,
    #[error("Connection reset by peer")]
    ECONNRESET = 131,
    #[error("Transport endpoint is already connected")]
    EISCONN = 133,
    #[error("Transport endpoint is not connected")]
    ENOTCONN = 134,
    #[error("Connection timed out")]
    ETIMEDOUT = 145,
    #[error("Connection refused")]
    ECONNREFUSED = 146,
}

impl Errno {
    /// The positive code written to `v0` on failure.
    #[inline]
    pub fn code(self) -> u32 {
        self.into()
    }

    /// Host errno values above 34 that have a different MIPS number.
    #[cfg(target_os = "linux")]
    fn from_host_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            36 => Errno::ENAMETOOLONG,
            38 => Errno::ENOSYS,
            39 => Errno::ENOTEMPTY,
            40 => Errno::ELOOP,
            88 => Errno::ENOTSOCK,
            95 => Errno::EOPNOTSUPP,
            97 => Errno::EAFNOSUPPORT,
            98 => Errno::EADDRINUSE,
            104 => Errno::ECONNRESET,
            106 => Errno::EISCONN,
            107 => Errno::ENOTCONN,
            110 => Errno::ETIMEDOUT,
            111 => Errno::ECONNREFUSED,
            _ => return None,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn from_host_raw(_raw: i32) -> Option<Self> {
        None
    }
}

impl From<io::Error> for Errno {
    fn from(err: io::Error) -> Self {
        if let Some(raw) = err.raw_os_error() {
            // 1..=34 is shared by every Linux port
            if (1..=34).contains(&raw) {
                if let Ok(errno) = Errno::try_from(raw as u32) {
                    return errno;
                }
            }
            if let Some(errno) = Errno::from_host_raw(raw) {
                return errno;
            }
        }
        match err.kind() {
            io::ErrorKind::NotFound => Errno::ENOENT,
            io::ErrorKind::PermissionDenied => Errno::EACCES,
            io::ErrorKind::AlreadyExists => Errno::EEXIST,
            io::ErrorKind::InvalidInput => Errno::EINVAL,
            io::ErrorKind::BrokenPipe => Errno::EPIPE,
            io::ErrorKind::WouldBlock => Errno::EAGAIN,
            io::ErrorKind::Interrupted => Errno::EINTR,
            io::ErrorKind::ConnectionRefused => Errno::ECONNREFUSED,
            io::ErrorKind::ConnectionReset => Errno::ECONNRESET,
            io::ErrorKind::NotConnected => Errno::ENOTCONN,
            io::ErrorKind::AddrInUse => Errno::EADDRINUSE,
            io::ErrorKind::TimedOut => Errno::ETIMEDOUT,
            io::ErrorKind::Unsupported => Errno::ENOSYS,
            _ => Errno::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mips_numbers_above_generic_range() {
        assert_eq!(Errno::ENOSYS.code(), 89);
        assert_eq!(Errno::ECONNREFUSED.code(), 146);
        assert_eq!(Errno::try_from(22u32), Ok(Errno::EINVAL));
    }

    #[test]
    fn io_errors_map_by_kind() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(Errno::from(err), Errno::ENOENT);
        let err = io::Error::new(io::ErrorKind::Other, "odd");
        assert_eq!(Errno::from(err), Errno::EIO);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn host_raw_errors_are_renumbered() {
        assert_eq!(Errno::from(io::Error::from_raw_os_error(39)), Errno::ENOTEMPTY);
        assert_eq!(Errno::from(io::Error::from_raw_os_error(9)), Errno::EBADF);
    }
}
