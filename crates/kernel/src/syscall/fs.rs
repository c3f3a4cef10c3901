use std::fs::{self, DirBuilder, Permissions};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use types::Errno;
use vm::AddressSpace;

use super::structs::{write_stat, write_statfs};
use super::{efault, Reply, SysResult};
use crate::files::descriptor::S_IFCHR;
use crate::files::{FileStat, FsStat, Target, Vfs};
use crate::task::Task;

const W_OK: u32 = 2;
const X_OK: u32 = 1;

impl Task {
    /// Guest path string at `addr`, as a host path under the root.
    fn host_path_at(&self, memory: &AddressSpace, addr: u32) -> Result<PathBuf, Errno> {
        let path = memory.load_string(addr).map_err(efault)?;
        self.vfs.host(self.files.cwd(), &path)
    }

    pub(super) fn sys_stat(&mut self, memory: &mut AddressSpace, path: u32, buf: u32, follow: bool, wide: bool) -> SysResult {
        let path = memory.load_string(path).map_err(efault)?;
        let stat = match self.vfs.resolve(self.files.cwd(), &path)? {
            Target::Device(_) => FileStat::synthetic(S_IFCHR | 0o666),
            Target::Host(host) => {
                let meta = if follow {
                    fs::metadata(&host)?
                } else {
                    fs::symlink_metadata(&host)?
                };
                FileStat::from_metadata(&meta)
            }
        };
        write_stat(self.registry().constants(), memory, buf, &stat, wide)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_statfs(&mut self, memory: &mut AddressSpace, path: u32, buf: u32, wide: bool) -> SysResult {
        let host = self.host_path_at(memory, path)?;
        fs::metadata(host)?;
        write_statfs(self.registry().constants(), memory, buf, &FsStat::synthetic(), wide)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_fstatfs(&mut self, memory: &mut AddressSpace, fd: u32, buf: u32, wide: bool) -> SysResult {
        self.files.get(fd)?;
        write_statfs(self.registry().constants(), memory, buf, &FsStat::synthetic(), wide)?;
        Ok(Reply::Value(0))
    }

    /// Everything runs as root, so only the mode bits and the read-only
    /// flag can refuse.
    pub(super) fn sys_access(&mut self, memory: &mut AddressSpace, path: u32, mode: u32) -> SysResult {
        let path = memory.load_string(path).map_err(efault)?;
        let Target::Host(host) = self.vfs.resolve(self.files.cwd(), &path)? else {
            return Ok(Reply::Value(0));
        };
        let meta = fs::metadata(host)?;
        if mode & W_OK != 0 && meta.permissions().readonly() {
            return Err(Errno::EACCES);
        }
        if mode & X_OK != 0 && meta.permissions().mode() & 0o111 == 0 {
            return Err(Errno::EACCES);
        }
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_mkdir(&mut self, memory: &mut AddressSpace, path: u32, mode: u32) -> SysResult {
        let host = self.host_path_at(memory, path)?;
        DirBuilder::new()
            .mode(mode & !self.files.umask() & 0o7777)
            .create(host)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_rmdir(&mut self, memory: &mut AddressSpace, path: u32) -> SysResult {
        fs::remove_dir(self.host_path_at(memory, path)?)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_unlink(&mut self, memory: &mut AddressSpace, path: u32) -> SysResult {
        fs::remove_file(self.host_path_at(memory, path)?)?;
        Ok(Reply::Value(0))
    }

    /// link and symlink. A symlink stores its target text unchanged.
    pub(super) fn sys_link(&mut self, memory: &mut AddressSpace, old: u32, new: u32, symbolic: bool) -> SysResult {
        let new = self.host_path_at(memory, new)?;
        if symbolic {
            let target = memory.load_string(old).map_err(efault)?;
            if target.is_empty() {
                return Err(Errno::ENOENT);
            }
            std::os::unix::fs::symlink(target, new)?;
        } else {
            fs::hard_link(self.host_path_at(memory, old)?, new)?;
        }
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_rename(&mut self, memory: &mut AddressSpace, old: u32, new: u32) -> SysResult {
        let old = self.host_path_at(memory, old)?;
        let new = self.host_path_at(memory, new)?;
        fs::rename(old, new)?;
        Ok(Reply::Value(0))
    }

    /// Copies at most `size` bytes, unterminated.
    pub(super) fn sys_readlink(&mut self, memory: &mut AddressSpace, path: u32, buf: u32, size: u32) -> SysResult {
        if size as i32 <= 0 {
            return Err(Errno::EINVAL);
        }
        let target = fs::read_link(self.host_path_at(memory, path)?)?;
        let bytes = target.as_os_str().as_bytes();
        let len = bytes.len().min(size as usize);
        memory.store_bytes(buf, &bytes[..len]).map_err(efault)?;
        Ok(Reply::Value(len as u32))
    }

    pub(super) fn sys_chdir(&mut self, memory: &mut AddressSpace, path: u32) -> SysResult {
        let path = memory.load_string(path).map_err(efault)?;
        let host = self.vfs.host(self.files.cwd(), &path)?;
        if !fs::metadata(host)?.is_dir() {
            return Err(Errno::ENOTDIR);
        }
        let cwd = Vfs::normalize(self.files.cwd(), &path);
        self.files.set_cwd(cwd);
        Ok(Reply::Value(0))
    }

    /// Returns the length including the terminator.
    pub(super) fn sys_getcwd(&mut self, memory: &mut AddressSpace, buf: u32, size: u32) -> SysResult {
        let mut bytes = self.files.cwd().as_bytes().to_vec();
        bytes.push(0);
        if bytes.len() > size as usize {
            return Err(Errno::ERANGE);
        }
        memory.store_bytes(buf, &bytes).map_err(efault)?;
        Ok(Reply::Value(bytes.len() as u32))
    }

    pub(super) fn sys_chmod(&mut self, memory: &mut AddressSpace, path: u32, mode: u32) -> SysResult {
        let host = self.host_path_at(memory, path)?;
        fs::set_permissions(host, Permissions::from_mode(mode & 0o7777))?;
        Ok(Reply::Value(0))
    }
}
