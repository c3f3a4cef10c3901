//! Constant table for the target C library.
//!
//! Holds symbolic constants and struct layouts keyed by name. The built-in
//! table describes uClibc on big-endian MIPS; a text file in the
//! `name=value` / `struct.field=offset,size` format can replace or extend
//! any entry.

use std::collections::HashMap;

/// Offset and width of one struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("line {line}: expected name=value")]
    MissingValue { line: usize },
    #[error("line {line}: bad number {text:?}")]
    BadNumber { line: usize, text: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantTable {
    values: HashMap<String, i64>,
    fields: HashMap<String, Field>,
    sizes: HashMap<String, u32>,
}

const BUILTIN_VALUES: &[(&str, i64)] = &[
    ("O_RDONLY", 0),
    ("O_WRONLY", 1),
    ("O_RDWR", 2),
    ("O_APPEND", 0x8),
    ("O_SYNC", 0x10),
    ("O_NONBLOCK", 0x80),
    ("O_CREAT", 0x100),
    ("O_TRUNC", 0x200),
    ("O_EXCL", 0x400),
    ("O_NOCTTY", 0x800),
    ("O_LARGEFILE", 0x2000),
    ("O_DIRECTORY", 0x10000),
    ("S_IFSOCK", 0o140000),
    ("S_IFLNK", 0o120000),
    ("S_IFREG", 0o100000),
    ("S_IFBLK", 0o60000),
    ("S_IFDIR", 0o40000),
    ("S_IFCHR", 0o20000),
    ("S_IFIFO", 0o10000),
    ("F_DUPFD", 0),
    ("F_GETFD", 1),
    ("F_SETFD", 2),
    ("F_GETFL", 3),
    ("F_SETFL", 4),
    ("FD_CLOEXEC", 1),
    ("SEEK_SET", 0),
    ("SEEK_CUR", 1),
    ("SEEK_END", 2),
    ("PROT_NONE", 0),
    ("PROT_READ", 1),
    ("PROT_WRITE", 2),
    ("PROT_EXEC", 4),
    ("MAP_SHARED", 1),
    ("MAP_PRIVATE", 2),
    ("MAP_FIXED", 0x10),
    ("MAP_ANONYMOUS", 0x800),
    ("SIG_DFL", 0),
    ("SIG_IGN", 1),
    ("SIG_BLOCK", 1),
    ("SIG_UNBLOCK", 2),
    ("SIG_SETMASK", 3),
    ("WNOHANG", 1),
    ("AF_INET", 2),
    ("SOCK_DGRAM", 1),
    ("SOCK_STREAM", 2),
    ("SOL_SOCKET", 0xffff),
    ("SO_REUSEADDR", 4),
    ("TCGETS", 0x540d),
    ("TCSETS", 0x540e),
    ("TCSETSW", 0x540f),
    ("TCSETSF", 0x5410),
    ("TIOCGWINSZ", 0x4008_7468),
    ("TIOCGPGRP", 0x4004_7477),
    ("TIOCSPGRP", 0x8004_7476),
    ("FIONBIO", 0x667e),
    ("FIONREAD", 0x467f),
    ("SIGHUP", 1),
    ("SIGINT", 2),
    ("SIGQUIT", 3),
    ("SIGILL", 4),
    ("SIGTRAP", 5),
    ("SIGABRT", 6),
    ("SIGEMT", 7),
    ("SIGFPE", 8),
    ("SIGKILL", 9),
    ("SIGBUS", 10),
    ("SIGSEGV", 11),
    ("SIGSYS", 12),
    ("SIGPIPE", 13),
    ("SIGALRM", 14),
    ("SIGTERM", 15),
    ("SIGUSR1", 16),
    ("SIGUSR2", 17),
    ("SIGCHLD", 18),
    ("SIGPWR", 19),
    ("SIGWINCH", 20),
    ("SIGURG", 21),
    ("SIGIO", 22),
    ("SIGSTOP", 23),
    ("SIGTSTP", 24),
    ("SIGCONT", 25),
    ("SIGTTIN", 26),
    ("SIGTTOU", 27),
    ("SIGVTALRM", 28),
    ("SIGPROF", 29),
    ("SIGXCPU", 30),
    ("SIGXFSZ", 31),
];

const BUILTIN_SIZES: &[(&str, u32)] = &[
    ("stat", 144),
    ("stat64", 104),
    ("utsname", 390),
    ("sigaction", 24),
    ("iovec", 8),
    ("timeval", 8),
    ("timespec", 8),
    ("winsize", 8),
    ("sockaddr_in", 16),
    ("statfs", 68),
    ("statfs64", 92),
];

const BUILTIN_FIELDS: &[(&str, u32, u32)] = &[
    ("stat.st_dev", 0, 4),
    ("stat.st_ino", 16, 4),
    ("stat.st_mode", 20, 4),
    ("stat.st_nlink", 24, 4),
    ("stat.st_uid", 28, 4),
    ("stat.st_gid", 32, 4),
    ("stat.st_rdev", 36, 4),
    ("stat.st_size", 48, 4),
    ("stat.st_atime", 56, 4),
    ("stat.st_mtime", 64, 4),
    ("stat.st_ctime", 72, 4),
    ("stat.st_blksize", 80, 4),
    ("stat.st_blocks", 84, 4),
    ("stat64.st_dev", 0, 4),
    ("stat64.st_ino", 16, 8),
    ("stat64.st_mode", 24, 4),
    ("stat64.st_nlink", 28, 4),
    ("stat64.st_uid", 32, 4),
    ("stat64.st_gid", 36, 4),
    ("stat64.st_rdev", 40, 4),
    ("stat64.st_size", 56, 8),
    ("stat64.st_atime", 64, 4),
    ("stat64.st_mtime", 72, 4),
    ("stat64.st_ctime", 80, 4),
    ("stat64.st_blksize", 88, 4),
    ("stat64.st_blocks", 96, 8),
    ("utsname.sysname", 0, 65),
    ("utsname.nodename", 65, 65),
    ("utsname.release", 130, 65),
    ("utsname.version", 195, 65),
    ("utsname.machine", 260, 65),
    ("sigaction.sa_flags", 0, 4),
    ("sigaction.sa_handler", 4, 4),
    ("sigaction.sa_mask", 8, 16),
    ("iovec.iov_base", 0, 4),
    ("iovec.iov_len", 4, 4),
    ("timeval.tv_sec", 0, 4),
    ("timeval.tv_usec", 4, 4),
    ("timespec.tv_sec", 0, 4),
    ("timespec.tv_nsec", 4, 4),
    ("winsize.ws_row", 0, 2),
    ("winsize.ws_col", 2, 2),
    ("winsize.ws_xpixel", 4, 2),
    ("winsize.ws_ypixel", 6, 2),
    ("sockaddr_in.sin_family", 0, 2),
    ("sockaddr_in.sin_port", 2, 2),
    ("sockaddr_in.sin_addr", 4, 4),
    ("statfs.f_type", 0, 4),
    ("statfs.f_bsize", 4, 4),
    ("statfs.f_frsize", 8, 4),
    ("statfs.f_blocks", 12, 4),
    ("statfs.f_bfree", 16, 4),
    ("statfs.f_files", 20, 4),
    ("statfs.f_ffree", 24, 4),
    ("statfs.f_bavail", 28, 4),
    ("statfs.f_namelen", 40, 4),
    ("statfs64.f_type", 0, 4),
    ("statfs64.f_bsize", 4, 4),
    ("statfs64.f_frsize", 8, 4),
    ("statfs64.f_blocks", 16, 8),
    ("statfs64.f_bfree", 24, 8),
    ("statfs64.f_files", 32, 8),
    ("statfs64.f_ffree", 40, 8),
    ("statfs64.f_bavail", 48, 8),
    ("statfs64.f_namelen", 64, 4),
];

impl ConstantTable {
    /// Table for uClibc on big-endian MIPS.
    pub fn builtin() -> Self {
        let mut table = ConstantTable::default();
        for (name, value) in BUILTIN_VALUES {
            table.values.insert((*name).to_string(), *value);
        }
        for (name, size) in BUILTIN_SIZES {
            table.sizes.insert((*name).to_string(), *size);
        }
        for (name, offset, size) in BUILTIN_FIELDS {
            table.fields.insert((*name).to_string(), Field { offset: *offset, size: *size });
        }
        table
    }

    /// Parse the generated text format.
    ///
    /// `sizeof_<struct>=N` sets a struct size, `<struct>.<field>=off,size`
    /// sets a field and `NAME=value` (or `NAME=value,value2`) sets a
    /// constant from its first value.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut table = ConstantTable::default();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = line
                .split_once('=')
                .ok_or(TableError::MissingValue { line: line_no })?;
            let nums = value
                .split(',')
                .map(|v| parse_number(v.trim()).ok_or_else(|| TableError::BadNumber {
                    line: line_no,
                    text: v.trim().to_string(),
                }))
                .collect::<Result<Vec<i64>, TableError>>()?;
            let name = name.trim();
            if let Some(strukt) = name.strip_prefix("sizeof_") {
                table.sizes.insert(strukt.to_string(), nums[0] as u32);
            } else if name.contains('.') {
                let size = nums.get(1).copied().unwrap_or(4);
                table.fields.insert(
                    name.to_string(),
                    Field { offset: nums[0] as u32, size: size as u32 },
                );
            } else {
                table.values.insert(name.to_string(), nums[0]);
            }
        }
        Ok(table)
    }

    /// Overlay `other` on top of this table.
    pub fn merge(&mut self, other: ConstantTable) {
        self.values.extend(other.values);
        self.fields.extend(other.fields);
        self.sizes.extend(other.sizes);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn field(&self, strukt: &str, field: &str) -> Option<Field> {
        self.fields.get(&format!("{strukt}.{field}")).copied()
    }

    pub fn size_of(&self, strukt: &str) -> Option<u32> {
        self.sizes.get(strukt).copied()
    }

    /// Reverse lookup restricted to names starting with `prefix`.
    pub fn name_of(&self, prefix: &str, value: i64) -> Option<&str> {
        let mut names: Vec<&str> = self
            .values
            .iter()
            .filter(|(name, v)| **v == value && name.starts_with(prefix))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names.first().copied()
    }
}

fn parse_number(text: &str) -> Option<i64> {
    let (neg, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_layouts() {
        let table = ConstantTable::builtin();
        assert_eq!(table.field("stat64", "st_size"), Some(Field { offset: 56, size: 8 }));
        assert_eq!(table.size_of("stat64"), Some(104));
        assert_eq!(table.get("MAP_ANONYMOUS"), Some(0x800));
        assert_eq!(table.name_of("SIG", 15), Some("SIGTERM"));
    }

    #[test]
    fn parse_generated_format() {
        let text = "# comment\nEINVAL=22\nsizeof_stat=144\nstat.st_mode=20,4\nMAP_FAILED=-1\n";
        let table = ConstantTable::parse(text).unwrap();
        assert_eq!(table.get("EINVAL"), Some(22));
        assert_eq!(table.get("MAP_FAILED"), Some(-1));
        assert_eq!(table.size_of("stat"), Some(144));
        assert_eq!(table.field("stat", "st_mode"), Some(Field { offset: 20, size: 4 }));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(ConstantTable::parse("novalue"), Err(TableError::MissingValue { line: 1 }));
        assert!(matches!(
            ConstantTable::parse("A=zz"),
            Err(TableError::BadNumber { line: 1, .. })
        ));
    }

    #[test]
    fn merge_overrides() {
        let mut table = ConstantTable::builtin();
        table.merge(ConstantTable::parse("stat64.st_size=48,8").unwrap());
        assert_eq!(table.field("stat64", "st_size").map(|f| f.offset), Some(48));
    }
}
