//! Guest path resolution.
//!
//! Guest paths are normalized lexically against the cwd and then mapped
//! under the configured host root. `..` never climbs above `/`.

use std::path::{Path, PathBuf};

use types::Errno;

use super::descriptor::Stream;

const PATH_MAX: usize = 4096;

/// Where a guest path leads.
#[derive(Debug, Clone)]
pub enum Target {
    Host(PathBuf),
    Device(Stream),
}

/// Figures reported by statfs. The host is not asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub kind: u32,
    pub bsize: u32,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub namelen: u32,
}

impl FsStat {
    pub fn synthetic() -> Self {
        Self {
            // EXT2_SUPER_MAGIC
            kind: 0xef53,
            bsize: 4096,
            blocks: 1 << 20,
            bfree: 1 << 19,
            bavail: 1 << 19,
            files: 1 << 16,
            ffree: 1 << 15,
            namelen: 255,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Vfs {
    root: PathBuf,
}

impl Vfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute, `.`/`..`-free form of `path` seen from `cwd`.
    pub fn normalize(cwd: &str, path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{cwd}/{path}")
        };
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => parts.push(name),
            }
        }
        format!("/{}", parts.join("/"))
    }

    /// Host location of a normalized guest path.
    pub fn host_path(&self, guest: &str) -> PathBuf {
        let rel = guest.trim_start_matches('/');
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }

    fn check(path: &str) -> Result<(), Errno> {
        if path.is_empty() {
            return Err(Errno::ENOENT);
        }
        if path.len() >= PATH_MAX {
            return Err(Errno::ENAMETOOLONG);
        }
        Ok(())
    }

    pub fn resolve(&self, cwd: &str, path: &str) -> Result<Target, Errno> {
        Self::check(path)?;
        let guest = Self::normalize(cwd, path);
        Ok(match guest.as_str() {
            "/dev/null" => Target::Device(Stream::Null),
            "/dev/tty" => Target::Device(Stream::Tty),
            _ => Target::Host(self.host_path(&guest)),
        })
    }

    /// Host path for calls that only make sense on real files.
    pub fn host(&self, cwd: &str, path: &str) -> Result<PathBuf, Errno> {
        Self::check(path)?;
        Ok(self.host_path(&Self::normalize(cwd, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_dots_without_escaping_root() {
        assert_eq!(Vfs::normalize("/home/user", "a/./b/../c"), "/home/user/a/c");
        assert_eq!(Vfs::normalize("/home", "../../../etc"), "/etc");
        assert_eq!(Vfs::normalize("/x", "/"), "/");
        assert_eq!(Vfs::normalize("/", "tmp//f"), "/tmp/f");
    }

    #[test]
    fn paths_map_under_root() {
        let vfs = Vfs::new("/srv/guest");
        match vfs.resolve("/", "etc/passwd").unwrap() {
            Target::Host(p) => assert_eq!(p, PathBuf::from("/srv/guest/etc/passwd")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(vfs.resolve("/dev", "null"), Ok(Target::Device(Stream::Null))));
        assert_eq!(vfs.host("/", "").err(), Some(Errno::ENOENT));
        assert_eq!(vfs.host("/", "..").unwrap(), PathBuf::from("/srv/guest"));
    }
}
