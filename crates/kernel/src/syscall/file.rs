use std::fs::{self, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::info;
use types::{Errno, Signal};
use vm::AddressSpace;

use super::structs::{write_stat, StructReader, StructWriter};
use super::{efault, Reply, SysResult};
use crate::files::descriptor::DirCursor;
use crate::files::{pipe, Access, DirEntry, Descriptor, Kind, StatusFlags, Target, MAX_FDS};
use crate::task::Task;
use crate::wake::POLL_INTERVAL;

const O_ACCMODE: u32 = 3;
pub(super) const O_CREAT: u32 = 0x100;
pub(super) const O_TRUNC: u32 = 0x200;
const O_EXCL: u32 = 0x400;
const O_DIRECTORY: u32 = 0x10000;

const F_DUPFD: u32 = 0;
const F_GETFD: u32 = 1;
const F_SETFD: u32 = 2;
const F_GETFL: u32 = 3;
const F_SETFL: u32 = 4;
const FD_CLOEXEC: u32 = 1;

const TCGETS: u32 = 0x540d;
const TCSETS: u32 = 0x540e;
const TCSETSW: u32 = 0x540f;
const TCSETSF: u32 = 0x5410;
const TIOCGWINSZ: u32 = 0x4008_7468;
const TIOCGPGRP: u32 = 0x4004_7477;
const TIOCSPGRP: u32 = 0x8004_7476;
const FIONBIO: u32 = 0x667e;
const FIONREAD: u32 = 0x467f;

/// Largest single transfer; longer requests complete partially.
const MAX_IO: usize = 1 << 20;
const IOV_MAX: u32 = 1024;

/// `linux_dirent`: ino, off, reclen, name, with the type in the last byte.
fn encode_dirent(entry: &DirEntry, off: u32) -> Vec<u8> {
    let reclen = (10 + entry.name.len() + 2 + 3) & !3;
    let mut rec = vec![0u8; reclen];
    rec[0..4].copy_from_slice(&(entry.ino as u32).to_be_bytes());
    rec[4..8].copy_from_slice(&off.to_be_bytes());
    rec[8..10].copy_from_slice(&(reclen as u16).to_be_bytes());
    rec[10..10 + entry.name.len()].copy_from_slice(entry.name.as_bytes());
    rec[reclen - 1] = entry.kind;
    rec
}

/// `linux_dirent64`: ino, off, reclen, type, name.
fn encode_dirent64(entry: &DirEntry, off: u32) -> Vec<u8> {
    let reclen = (19 + entry.name.len() + 1 + 7) & !7;
    let mut rec = vec![0u8; reclen];
    rec[0..8].copy_from_slice(&entry.ino.to_be_bytes());
    rec[8..16].copy_from_slice(&(off as i64).to_be_bytes());
    rec[16..18].copy_from_slice(&(reclen as u16).to_be_bytes());
    rec[18] = entry.kind;
    rec[19..19 + entry.name.len()].copy_from_slice(entry.name.as_bytes());
    rec
}

impl Task {
    pub(super) fn sys_open(&mut self, memory: &mut AddressSpace, path: u32, flags: u32, mode: u32) -> SysResult {
        let path = memory.load_string(path).map_err(efault)?;
        let access = match flags & O_ACCMODE {
            0 => Access::READ,
            1 => Access::WRITE,
            2 => Access::READ | Access::WRITE,
            _ => return Err(Errno::EINVAL),
        };
        let status = StatusFlags::from_bits_truncate(flags);

        let desc = match self.vfs.resolve(self.files.cwd(), &path)? {
            Target::Device(stream) => Descriptor::new(Kind::Stream(stream), access, status, path.clone()),
            Target::Host(host) => {
                let is_dir = fs::metadata(&host).map(|m| m.is_dir()).unwrap_or(false);
                if is_dir {
                    if access.contains(Access::WRITE) {
                        return Err(Errno::EISDIR);
                    }
                    let cursor = DirCursor::open(&host)?;
                    Descriptor::new(Kind::Directory(Mutex::new(cursor)), Access::READ | Access::SEEK, status, path.clone())
                } else {
                    if flags & O_DIRECTORY != 0 && host.exists() {
                        return Err(Errno::ENOTDIR);
                    }
                    let file = OpenOptions::new()
                        .read(access.contains(Access::READ))
                        .write(access.contains(Access::WRITE))
                        .create(flags & O_CREAT != 0)
                        .create_new(flags & (O_CREAT | O_EXCL) == O_CREAT | O_EXCL)
                        .truncate(flags & O_TRUNC != 0)
                        .mode(mode & !self.files.umask() & 0o7777)
                        .open(&host)?;
                    Descriptor::new(Kind::File(file), access | Access::SEEK, status, path.clone())
                }
            }
        };
        let fd = self.files.insert(desc)?;
        info!("pid {}: open {} -> {}", self.pid(), path, fd);
        Ok(Reply::Value(fd))
    }

    pub(super) fn sys_read(&mut self, memory: &mut AddressSpace, fd: u32, buf: u32, count: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        let mut data = vec![0u8; (count as usize).min(MAX_IO)];
        let n = desc.read(&mut data, &self.signals)?;
        memory.store_bytes(buf, &data[..n]).map_err(efault)?;
        Ok(Reply::Value(n as u32))
    }

    fn write_all(&self, desc: &Descriptor, data: &[u8]) -> SysResult {
        match desc.write(data, &self.signals) {
            Ok(n) => Ok(Reply::Value(n as u32)),
            Err(Errno::EPIPE) => {
                self.raise_self(Signal::SIGPIPE);
                Err(Errno::EPIPE)
            }
            Err(errno) => Err(errno),
        }
    }

    pub(super) fn sys_write(&mut self, memory: &mut AddressSpace, fd: u32, buf: u32, count: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        let data = memory
            .load_bytes(buf, (count as usize).min(MAX_IO))
            .map_err(efault)?;
        self.write_all(&desc, &data)
    }

    pub(super) fn sys_writev(&mut self, memory: &mut AddressSpace, fd: u32, iov: u32, iovcnt: u32) -> SysResult {
        if iovcnt > IOV_MAX {
            return Err(Errno::EINVAL);
        }
        let desc = self.files.get(fd)?;
        let constants = self.registry().constants();
        let stride = constants.size_of("iovec").unwrap_or(8);
        let mut data = Vec::new();
        for i in 0..iovcnt {
            let r = StructReader::load(constants, "iovec", memory, iov.wrapping_add(i * stride))?;
            let base = r.get("iov_base") as u32;
            let len = r.get("iov_len") as usize;
            data.extend(memory.load_bytes(base, len.min(MAX_IO)).map_err(efault)?);
        }
        self.write_all(&desc, &data)
    }

    pub(super) fn sys_lseek(&mut self, fd: u32, offset: i64, whence: u32) -> SysResult {
        let pos = self.files.get(fd)?.seek(offset, whence)?;
        u32::try_from(pos).map(Reply::Value).map_err(|_| Errno::EINVAL)
    }

    /// _llseek(fd, high, low, result*, whence)
    pub(super) fn sys_llseek(&mut self, memory: &mut AddressSpace, args: [u32; 6]) -> SysResult {
        let offset = (((args[1] as u64) << 32) | args[2] as u64) as i64;
        let pos = self.files.get(args[0])?.seek(offset, args[4])?;
        memory
            .store_words(args[3], &[(pos >> 32) as u32, pos as u32])
            .map_err(efault)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_dup(&mut self, fd: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        self.files.insert_from(0, desc, false).map(Reply::Value)
    }

    pub(super) fn sys_dup2(&mut self, old: u32, new: u32) -> SysResult {
        let desc = self.files.get(old)?;
        if old == new {
            return Ok(Reply::Value(new));
        }
        if new as usize >= MAX_FDS {
            return Err(Errno::EBADF);
        }
        self.files.insert_at(new, desc).map(Reply::Value)
    }

    pub(super) fn sys_fcntl(&mut self, fd: u32, cmd: u32, arg: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        match cmd {
            F_DUPFD => self.files.insert_from(arg, desc, false).map(Reply::Value),
            F_GETFD => Ok(Reply::Value(self.files.cloexec(fd)? as u32)),
            F_SETFD => {
                self.files.set_cloexec(fd, arg & FD_CLOEXEC != 0)?;
                Ok(Reply::Value(0))
            }
            F_GETFL => Ok(Reply::Value(desc.open_flags())),
            F_SETFL => {
                desc.set_status(StatusFlags::from_bits_truncate(arg));
                Ok(Reply::Value(0))
            }
            _ => {
                info!("pid {}: fcntl cmd {} not supported", self.pid(), cmd);
                Err(Errno::EINVAL)
            }
        }
    }

    /// Descriptors come back in v0 and v1.
    pub(super) fn sys_pipe(&mut self) -> SysResult {
        let (reader, writer) = pipe();
        let r = self
            .files
            .insert(Descriptor::new(Kind::PipeReader(reader), Access::READ, StatusFlags::empty(), "pipe"))?;
        let writer = Descriptor::new(Kind::PipeWriter(writer), Access::WRITE, StatusFlags::empty(), "pipe");
        match self.files.insert_from(0, Arc::new(writer), false) {
            Ok(w) => Ok(Reply::Pair(r, w)),
            Err(errno) => {
                self.files.close(r)?;
                Err(errno)
            }
        }
    }

    pub(super) fn sys_getdents(&mut self, memory: &mut AddressSpace, fd: u32, dirp: u32, count: u32, wide: bool) -> SysResult {
        let desc = self.files.get(fd)?;
        let mut cursor = desc.directory()?;
        let mut out = Vec::new();
        let mut taken = 0;
        for (i, entry) in cursor.remaining().iter().enumerate() {
            let off = (cursor.position() + i + 1) as u32;
            let rec = if wide {
                encode_dirent64(entry, off)
            } else {
                encode_dirent(entry, off)
            };
            if out.len() + rec.len() > count as usize {
                break;
            }
            out.extend(rec);
            taken += 1;
        }
        if taken == 0 && !cursor.remaining().is_empty() {
            return Err(Errno::EINVAL);
        }
        memory.store_bytes(dirp, &out).map_err(efault)?;
        cursor.advance(taken);
        Ok(Reply::Value(out.len() as u32))
    }

    pub(super) fn sys_fstat(&mut self, memory: &mut AddressSpace, fd: u32, buf: u32, wide: bool) -> SysResult {
        let stat = self.files.get(fd)?.stat()?;
        write_stat(self.registry().constants(), memory, buf, &stat, wide)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_ioctl(&mut self, memory: &mut AddressSpace, fd: u32, request: u32, arg: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        let terminal = desc.is_terminal();
        match request {
            TCGETS | TCSETS | TCSETSW | TCSETSF if terminal => Ok(Reply::Value(0)),
            TIOCGWINSZ if terminal => {
                let mut w = StructWriter::new(self.registry().constants(), "winsize")?;
                w.set("ws_row", 24).set("ws_col", 80);
                w.store(memory, arg)?;
                Ok(Reply::Value(0))
            }
            TIOCGPGRP if terminal => {
                let pgrp = self.registry().getpgid(self.pid())?;
                memory.store_word(arg, pgrp).map_err(efault)?;
                Ok(Reply::Value(0))
            }
            TIOCSPGRP if terminal => Ok(Reply::Value(0)),
            FIONBIO => {
                let on = memory.load_word(arg).map_err(efault)? != 0;
                let mut status = desc.status();
                status.set(StatusFlags::NONBLOCK, on);
                desc.set_status(status);
                Ok(Reply::Value(0))
            }
            FIONREAD => {
                let n = desc.available()?;
                memory.store_word(arg, n as u32).map_err(efault)?;
                Ok(Reply::Value(0))
            }
            _ => {
                info!("pid {}: ioctl 0x{:x} on {} not supported", self.pid(), request, desc.path());
                Err(Errno::ENOTTY)
            }
        }
    }

    /// _newselect over the first word of each fd_set, polled until
    /// something is ready, the timeout passes or a signal arrives.
    pub(super) fn sys_select(&mut self, memory: &mut AddressSpace, args: [u32; 6]) -> SysResult {
        let [nfds, readfds, writefds, exceptfds, timeout, _] = args;
        let nfds = nfds.min(32);
        let load_set = |addr: u32| -> Result<u32, Errno> {
            if addr == 0 {
                Ok(0)
            } else {
                memory.load_word(addr).map_err(efault)
            }
        };
        let mask = if nfds == 32 { u32::MAX } else { (1u32 << nfds) - 1 };
        let want_read = load_set(readfds)? & mask;
        let want_write = load_set(writefds)? & mask;
        let deadline = if timeout != 0 {
            let words = memory.load_words(timeout, 2).map_err(efault)?;
            Some(Instant::now() + Duration::new(words[0] as u64, words[1].min(999_999) * 1000))
        } else {
            None
        };

        loop {
            let mut ready_read = 0u32;
            let mut ready_write = 0u32;
            for fd in 0..nfds {
                let bit = 1 << fd;
                if (want_read | want_write) & bit == 0 {
                    continue;
                }
                let desc = self.files.get(fd)?;
                if want_read & bit != 0 && desc.readable() {
                    ready_read |= bit;
                }
                if want_write & bit != 0 && desc.writable() {
                    ready_write |= bit;
                }
            }

            let count = ready_read.count_ones() + ready_write.count_ones();
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if count > 0 || expired {
                for (addr, bits) in [(readfds, ready_read), (writefds, ready_write), (exceptfds, 0)] {
                    if addr != 0 {
                        memory.store_word(addr, bits).map_err(efault)?;
                    }
                }
                return Ok(Reply::Value(count));
            }
            if self.signals.interrupted() {
                return Err(Errno::EINTR);
            }
            let wait = deadline.map_or(POLL_INTERVAL, |d| {
                d.saturating_duration_since(Instant::now()).min(POLL_INTERVAL)
            });
            self.signals.wake().wait_timeout(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirent_records_are_aligned() {
        let entry = DirEntry { ino: 7, name: "abc".into(), kind: 8 };
        let rec = encode_dirent(&entry, 1);
        assert_eq!(rec.len() % 4, 0);
        assert_eq!(&rec[10..14], b"abc\0");
        assert_eq!(u16::from_be_bytes([rec[8], rec[9]]) as usize, rec.len());
        assert_eq!(rec[rec.len() - 1], 8);

        let rec = encode_dirent64(&entry, 1);
        assert_eq!(rec.len(), 24);
        assert_eq!(rec[18], 8);
        assert_eq!(&rec[19..23], b"abc\0");
    }
}
