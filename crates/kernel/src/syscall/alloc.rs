use std::os::unix::fs::FileExt;

use log::debug;
use types::Errno;
use vm::{AddressSpace, MemoryError};

use super::{Reply, SysResult};
use crate::files::Kind;
use crate::task::Task;

const MAP_FIXED: u32 = 0x10;
const MAP_ANONYMOUS: u32 = 0x800;

fn mapping_error(err: MemoryError) -> Errno {
    match err {
        MemoryError::Exhausted { .. } => Errno::ENOMEM,
        MemoryError::Reserved(_) | MemoryError::Misaligned { .. } | MemoryError::NotAllocated(_) => Errno::EINVAL,
        MemoryError::Unbound(_) => Errno::EFAULT,
    }
}

impl Task {
    /// A failed growth leaves the break where it was and reports it.
    pub(super) fn sys_brk(&mut self, memory: &mut AddressSpace, addr: u32) -> SysResult {
        match memory.set_brk(addr) {
            Ok(brk) => Ok(Reply::Value(brk)),
            Err(err) => {
                debug!("pid {}: brk 0x{:x} refused: {}", self.pid(), addr, err);
                Ok(Reply::Value(memory.brk()))
            }
        }
    }

    /// mmap(addr, len, prot, flags, fd, offset). Mappings are private; file
    /// contents are copied in once.
    pub(super) fn sys_mmap(&mut self, memory: &mut AddressSpace, args: [u32; 6]) -> SysResult {
        let [addr, len, _prot, flags, fd, offset] = args;
        if len == 0 {
            return Err(Errno::EINVAL);
        }
        let source = if flags & MAP_ANONYMOUS == 0 {
            let desc = self.files.get(fd)?;
            match desc.kind() {
                Kind::File(_) => Some(desc),
                _ => return Err(Errno::ENODEV),
            }
        } else {
            None
        };

        let fixed = flags & MAP_FIXED != 0;
        if fixed && addr == 0 {
            return Err(Errno::EINVAL);
        }
        let base = memory
            .alloc(if fixed { addr } else { 0 }, len)
            .map_err(mapping_error)?;
        if fixed {
            memory
                .store_bytes(base, &vec![0; len as usize])
                .map_err(mapping_error)?;
        }

        if let Some(desc) = source {
            if let Kind::File(file) = desc.kind() {
                let mut data = vec![0u8; len as usize];
                let mut filled = 0;
                while filled < data.len() {
                    let n = file.read_at(&mut data[filled..], offset as u64 + filled as u64)?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                memory.store_bytes(base, &data[..filled]).map_err(mapping_error)?;
            }
        }
        Ok(Reply::Value(base))
    }

    pub(super) fn sys_munmap(&mut self, memory: &mut AddressSpace, addr: u32, len: u32) -> SysResult {
        memory.free(addr, len).map_err(mapping_error)?;
        Ok(Reply::Value(0))
    }
}
