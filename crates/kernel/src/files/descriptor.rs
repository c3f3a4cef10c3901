use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirEntryExt, FileTypeExt, MetadataExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bitflags::bitflags;
use types::Errno;

use super::pipe::{PipeReader, PipeWriter};
use super::socket::Socket;
use crate::config::SharedBuffer;
use crate::signal::Signals;

pub const S_IFIFO: u32 = 0o010000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFSOCK: u32 = 0o140000;

pub const DT_UNKNOWN: u8 = 0;
pub const DT_FIFO: u8 = 1;
pub const DT_CHR: u8 = 2;
pub const DT_DIR: u8 = 4;
pub const DT_REG: u8 = 8;
pub const DT_LNK: u8 = 10;
pub const DT_SOCK: u8 = 12;

bitflags! {
    /// What the descriptor was opened for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READ = 1;
        const WRITE = 2;
        const SEEK = 4;
    }
}

bitflags! {
    /// Status flags changeable through F_SETFL, with their O_* values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        const APPEND = 0x8;
        const NONBLOCK = 0x80;
    }
}

/// Result of stat on any kind of descriptor or path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub blksize: u32,
    pub blocks: u64,
}

impl FileStat {
    pub fn from_metadata(meta: &fs::Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev(),
            size: meta.size(),
            atime: meta.atime(),
            mtime: meta.mtime(),
            ctime: meta.ctime(),
            blksize: meta.blksize() as u32,
            blocks: meta.blocks(),
        }
    }

    pub(crate) fn synthetic(mode: u32) -> Self {
        Self {
            mode,
            nlink: 1,
            blksize: 4096,
            ..Self::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & 0o170000 == S_IFDIR
    }
}

/// One `getdents` record before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    pub name: String,
    pub kind: u8,
}

/// Listing of a directory taken at open time plus a read position.
#[derive(Debug)]
pub struct DirCursor {
    entries: Vec<DirEntry>,
    pos: usize,
    stat: FileStat,
}

impl DirCursor {
    pub fn open(path: &std::path::Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        let parent = path
            .parent()
            .and_then(|p| fs::metadata(p).ok())
            .map_or(meta.ino(), |m| m.ino());
        let mut entries = vec![
            DirEntry { ino: meta.ino(), name: ".".into(), kind: DT_DIR },
            DirEntry { ino: parent, name: "..".into(), kind: DT_DIR },
        ];
        let mut rest = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let kind = entry.file_type().map_or(DT_UNKNOWN, |t| {
                if t.is_dir() {
                    DT_DIR
                } else if t.is_symlink() {
                    DT_LNK
                } else if t.is_file() {
                    DT_REG
                } else if t.is_fifo() {
                    DT_FIFO
                } else if t.is_socket() {
                    DT_SOCK
                } else if t.is_char_device() {
                    DT_CHR
                } else {
                    DT_UNKNOWN
                }
            });
            rest.push(DirEntry {
                ino: entry.ino(),
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        rest.sort_by(|a, b| a.name.cmp(&b.name));
        entries.extend(rest);
        Ok(Self {
            entries,
            pos: 0,
            stat: FileStat::from_metadata(&meta),
        })
    }

    /// Entries not yet handed out.
    pub fn remaining(&self) -> &[DirEntry] {
        &self.entries[self.pos..]
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.entries.len());
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.entries.len());
    }
}

/// Console-like endpoints.
#[derive(Debug, Clone)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
    /// `/dev/null`.
    Null,
    /// `/dev/tty`: host stdin and stdout.
    Tty,
    /// Captured input, EOF once drained.
    Input(SharedBuffer),
    /// Captured output.
    Output(SharedBuffer),
}

impl Stream {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        match self {
            Stream::Stdin | Stream::Tty => Ok(io::stdin().lock().read(buf)?),
            Stream::Null => Ok(0),
            Stream::Input(input) => {
                let bytes = input.take(buf.len());
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            Stream::Stdout | Stream::Stderr | Stream::Output(_) => Err(Errno::EBADF),
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize, Errno> {
        match self {
            Stream::Stdout | Stream::Tty => {
                let mut out = io::stdout().lock();
                out.write_all(data)?;
                out.flush()?;
                Ok(data.len())
            }
            Stream::Stderr => {
                io::stderr().lock().write_all(data)?;
                Ok(data.len())
            }
            Stream::Null => Ok(data.len()),
            Stream::Output(output) => {
                output.append(data);
                Ok(data.len())
            }
            Stream::Stdin | Stream::Input(_) => Err(Errno::EBADF),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Stream::Null)
    }

    fn available(&self) -> usize {
        match self {
            Stream::Input(input) => input.len(),
            _ => 0,
        }
    }
}

/// Kind-specific state of a descriptor.
#[derive(Debug)]
pub enum Kind {
    File(fs::File),
    Directory(Mutex<DirCursor>),
    Stream(Stream),
    PipeReader(PipeReader),
    PipeWriter(PipeWriter),
    Socket(Socket),
}

/// An open file description.
#[derive(Debug)]
pub struct Descriptor {
    kind: Kind,
    access: Access,
    status: AtomicU32,
    path: String,
}

impl Descriptor {
    pub fn new(kind: Kind, access: Access, status: StatusFlags, path: impl Into<String>) -> Self {
        Self {
            kind,
            access,
            status: AtomicU32::new(status.bits()),
            path: path.into(),
        }
    }

    pub fn stream(stream: Stream, access: Access, path: &str) -> Self {
        Self::new(Kind::Stream(stream), access, StatusFlags::empty(), path)
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_truncate(self.status.load(Ordering::Relaxed))
    }

    pub fn set_status(&self, flags: StatusFlags) {
        self.status.store(flags.bits(), Ordering::Relaxed);
    }

    fn nonblocking(&self) -> bool {
        self.status().contains(StatusFlags::NONBLOCK)
    }

    /// Guest `O_ACCMODE` bits plus status flags, for F_GETFL.
    pub fn open_flags(&self) -> u32 {
        let mode = match (self.access.contains(Access::READ), self.access.contains(Access::WRITE)) {
            (true, true) => 2,
            (false, true) => 1,
            _ => 0,
        };
        mode | self.status().bits()
    }

    pub fn read(&self, buf: &mut [u8], signals: &Signals) -> Result<usize, Errno> {
        if !self.access.contains(Access::READ) {
            return Err(Errno::EBADF);
        }
        match &self.kind {
            Kind::File(file) => {
                let mut file: &fs::File = file;
                Ok(file.read(buf)?)
            }
            Kind::Directory(_) => Err(Errno::EISDIR),
            Kind::Stream(stream) => stream.read(buf),
            Kind::PipeReader(pipe) => pipe.read(buf, self.nonblocking(), signals),
            Kind::PipeWriter(_) => Err(Errno::EBADF),
            Kind::Socket(socket) => socket.read(buf, self.nonblocking(), signals),
        }
    }

    pub fn write(&self, data: &[u8], signals: &Signals) -> Result<usize, Errno> {
        if !self.access.contains(Access::WRITE) {
            return Err(Errno::EBADF);
        }
        match &self.kind {
            Kind::File(file) => {
                let mut file: &fs::File = file;
                if self.status().contains(StatusFlags::APPEND) {
                    file.seek(SeekFrom::End(0))?;
                }
                Ok(file.write(data)?)
            }
            Kind::Directory(_) => Err(Errno::EISDIR),
            Kind::Stream(stream) => stream.write(data),
            Kind::PipeWriter(pipe) => pipe.write(data),
            Kind::PipeReader(_) => Err(Errno::EBADF),
            Kind::Socket(socket) => socket.write(data, self.nonblocking(), signals),
        }
    }

    /// lseek. `whence` is SEEK_SET, SEEK_CUR or SEEK_END.
    pub fn seek(&self, offset: i64, whence: u32) -> Result<u64, Errno> {
        match &self.kind {
            Kind::File(file) => {
                let pos = match whence {
                    0 => SeekFrom::Start(u64::try_from(offset).map_err(|_| Errno::EINVAL)?),
                    1 => SeekFrom::Current(offset),
                    2 => SeekFrom::End(offset),
                    _ => return Err(Errno::EINVAL),
                };
                let mut file: &fs::File = file;
                Ok(file.seek(pos)?)
            }
            Kind::Directory(cursor) => {
                let mut cursor = lock(cursor);
                let pos = match whence {
                    0 => offset,
                    1 => cursor.position() as i64 + offset,
                    _ => return Err(Errno::EINVAL),
                };
                if pos < 0 {
                    return Err(Errno::EINVAL);
                }
                cursor.seek(pos as usize);
                Ok(cursor.position() as u64)
            }
            _ => Err(Errno::ESPIPE),
        }
    }

    pub fn stat(&self) -> Result<FileStat, Errno> {
        match &self.kind {
            Kind::File(file) => Ok(FileStat::from_metadata(&file.metadata()?)),
            Kind::Directory(cursor) => Ok(lock(cursor).stat),
            Kind::Stream(_) => Ok(FileStat::synthetic(S_IFCHR | 0o666)),
            Kind::PipeReader(_) | Kind::PipeWriter(_) => Ok(FileStat::synthetic(S_IFIFO | 0o600)),
            Kind::Socket(_) => Ok(FileStat::synthetic(S_IFSOCK | 0o777)),
        }
    }

    /// The directory cursor, for getdents.
    pub fn directory(&self) -> Result<MutexGuard<'_, DirCursor>, Errno> {
        match &self.kind {
            Kind::Directory(cursor) => Ok(lock(cursor)),
            _ => Err(Errno::ENOTDIR),
        }
    }

    pub fn socket(&self) -> Result<&Socket, Errno> {
        match &self.kind {
            Kind::Socket(socket) => Ok(socket),
            _ => Err(Errno::ENOTSOCK),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(&self.kind, Kind::Stream(stream) if stream.is_terminal())
    }

    /// A read would not block.
    pub fn readable(&self) -> bool {
        match &self.kind {
            Kind::PipeReader(pipe) => pipe.readable(),
            Kind::PipeWriter(_) => false,
            Kind::Socket(socket) => socket.readable(),
            _ => self.access.contains(Access::READ),
        }
    }

    /// A write would not block.
    pub fn writable(&self) -> bool {
        match &self.kind {
            Kind::PipeReader(_) => false,
            Kind::Socket(socket) => socket.writable(),
            _ => self.access.contains(Access::WRITE),
        }
    }

    /// Bytes readable right now, for FIONREAD.
    pub fn available(&self) -> Result<usize, Errno> {
        match &self.kind {
            Kind::File(file) => {
                let mut file: &fs::File = file;
                let pos = file.stream_position()?;
                let len = file.metadata()?.len();
                Ok(len.saturating_sub(pos) as usize)
            }
            Kind::PipeReader(pipe) => Ok(pipe.available()),
            Kind::Stream(stream) => Ok(stream.available()),
            Kind::Socket(_) => Ok(0),
            Kind::Directory(_) | Kind::PipeWriter(_) => Err(Errno::EINVAL),
        }
    }
}

fn lock(cursor: &Mutex<DirCursor>) -> MutexGuard<'_, DirCursor> {
    cursor.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalState;

    #[test]
    fn access_flags_gate_io() {
        let signals = Signals::new(SignalState::new());
        let out = SharedBuffer::new();
        let desc = Descriptor::stream(Stream::Output(out.clone()), Access::WRITE, "out");
        assert_eq!(desc.write(b"abc", &signals), Ok(3));
        assert_eq!(desc.read(&mut [0u8; 4], &signals), Err(Errno::EBADF));
        assert_eq!(out.contents(), b"abc");
        assert_eq!(desc.seek(0, 0), Err(Errno::ESPIPE));
        assert_eq!(desc.open_flags(), 1);
    }

    #[test]
    fn captured_input_drains_to_eof() {
        let signals = Signals::new(SignalState::new());
        let input = SharedBuffer::with_contents(b"xyz");
        let desc = Descriptor::stream(Stream::Input(input), Access::READ, "in");
        let mut buf = [0u8; 2];
        assert_eq!(desc.available(), Ok(3));
        assert_eq!(desc.read(&mut buf, &signals), Ok(2));
        assert_eq!(desc.read(&mut buf, &signals), Ok(1));
        assert_eq!(desc.read(&mut buf, &signals), Ok(0));
    }

    #[test]
    fn status_flags_are_shared_by_the_description() {
        let desc = Descriptor::stream(Stream::Null, Access::READ | Access::WRITE, "/dev/null");
        desc.set_status(StatusFlags::NONBLOCK);
        assert_eq!(desc.open_flags(), 2 | 0x80);
        assert!(!desc.is_terminal());
        assert_eq!(desc.stat().unwrap().mode & 0o170000, S_IFCHR);
    }
}
