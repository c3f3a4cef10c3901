use std::sync::Arc;

use types::Errno;

use super::descriptor::{Access, Descriptor, Stream};
use crate::config::Stdio;

/// Descriptor slots per process.
pub const MAX_FDS: usize = 32;

#[derive(Debug, Clone)]
struct Slot {
    desc: Arc<Descriptor>,
    cloexec: bool,
}

/// Per-process descriptor table with cwd and umask.
///
/// Cloning the table (fork) clones every `Arc`, so each open description
/// stays alive until its last slot in any process is closed.
#[derive(Debug, Clone)]
pub struct FileTable {
    slots: Vec<Option<Slot>>,
    cwd: String,
    umask: u32,
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_FDS],
            cwd: "/".to_string(),
            umask: 0o022,
        }
    }

    /// Table with 0, 1 and 2 connected as `stdio` says.
    pub fn with_stdio(stdio: &Stdio) -> Self {
        let (input, output, error) = match stdio {
            Stdio::Inherit => (Stream::Stdin, Stream::Stdout, Stream::Stderr),
            Stdio::Capture { input, output, error } => (
                Stream::Input(input.clone()),
                Stream::Output(output.clone()),
                Stream::Output(error.clone()),
            ),
        };
        let mut table = Self::new();
        table.slots[0] = Some(Slot::new(Descriptor::stream(input, Access::READ, "stdin")));
        table.slots[1] = Some(Slot::new(Descriptor::stream(output, Access::WRITE, "stdout")));
        table.slots[2] = Some(Slot::new(Descriptor::stream(error, Access::WRITE, "stderr")));
        table
    }

    fn slot(&self, fd: u32) -> Result<&Slot, Errno> {
        self.slots
            .get(fd as usize)
            .and_then(Option::as_ref)
            .ok_or(Errno::EBADF)
    }

    pub fn get(&self, fd: u32) -> Result<Arc<Descriptor>, Errno> {
        self.slot(fd).map(|slot| Arc::clone(&slot.desc))
    }

    /// Put `desc` in the lowest free slot at or above `min`.
    pub fn insert_from(&mut self, min: u32, desc: Arc<Descriptor>, cloexec: bool) -> Result<u32, Errno> {
        let fd = (min as usize..MAX_FDS)
            .find(|&fd| self.slots[fd].is_none())
            .ok_or(if (min as usize) < MAX_FDS { Errno::EMFILE } else { Errno::EINVAL })?;
        self.slots[fd] = Some(Slot { desc, cloexec });
        Ok(fd as u32)
    }

    pub fn insert(&mut self, desc: Descriptor) -> Result<u32, Errno> {
        self.insert_from(0, Arc::new(desc), false)
    }

    /// dup2: `fd` is closed first if open.
    pub fn insert_at(&mut self, fd: u32, desc: Arc<Descriptor>) -> Result<u32, Errno> {
        let slot = self.slots.get_mut(fd as usize).ok_or(Errno::EBADF)?;
        *slot = Some(Slot { desc, cloexec: false });
        Ok(fd)
    }

    pub fn close(&mut self, fd: u32) -> Result<(), Errno> {
        let slot = self.slots.get_mut(fd as usize).ok_or(Errno::EBADF)?;
        slot.take().map(drop).ok_or(Errno::EBADF)
    }

    pub fn cloexec(&self, fd: u32) -> Result<bool, Errno> {
        self.slot(fd).map(|slot| slot.cloexec)
    }

    pub fn set_cloexec(&mut self, fd: u32, cloexec: bool) -> Result<(), Errno> {
        let slot = self
            .slots
            .get_mut(fd as usize)
            .and_then(Option::as_mut)
            .ok_or(Errno::EBADF)?;
        slot.cloexec = cloexec;
        Ok(())
    }

    /// Close everything marked close-on-exec.
    pub fn close_on_exec(&mut self) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|s| s.cloexec) {
                *slot = None;
            }
        }
    }

    pub fn close_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: String) {
        self.cwd = cwd;
    }

    pub fn umask(&self) -> u32 {
        self.umask
    }

    /// Set the umask and return the old one.
    pub fn set_umask(&mut self, mask: u32) -> u32 {
        std::mem::replace(&mut self.umask, mask & 0o777)
    }
}

impl Slot {
    fn new(desc: Descriptor) -> Self {
        Self {
            desc: Arc::new(desc),
            cloexec: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::pipe::pipe;
    use crate::files::Kind;
    use crate::files::StatusFlags;
    use crate::signal::{SignalState, Signals};

    fn null() -> Descriptor {
        Descriptor::stream(Stream::Null, Access::READ | Access::WRITE, "/dev/null")
    }

    #[test]
    fn lowest_free_slot_is_used() {
        let mut table = FileTable::with_stdio(&Stdio::capture());
        assert_eq!(table.insert(null()), Ok(3));
        assert_eq!(table.insert(null()), Ok(4));
        table.close(3).unwrap();
        assert_eq!(table.insert(null()), Ok(3));
        assert_eq!(table.close(9), Err(Errno::EBADF));
        assert_eq!(table.get(40).err(), Some(Errno::EBADF));
    }

    #[test]
    fn table_fills_up() {
        let mut table = FileTable::new();
        for fd in 0..MAX_FDS as u32 {
            assert_eq!(table.insert(null()), Ok(fd));
        }
        assert_eq!(table.insert(null()), Err(Errno::EMFILE));
    }

    #[test]
    fn forked_table_keeps_pipe_open_until_last_close() {
        let signals = Signals::new(SignalState::new());
        let (reader, writer) = pipe();
        let mut parent = FileTable::new();
        let r = parent
            .insert(Descriptor::new(Kind::PipeReader(reader), Access::READ, StatusFlags::empty(), "pipe"))
            .unwrap();
        let w = parent
            .insert(Descriptor::new(Kind::PipeWriter(writer), Access::WRITE, StatusFlags::empty(), "pipe"))
            .unwrap();
        let mut child = parent.clone();

        parent.close(w).unwrap();
        let reader = parent.get(r).unwrap();
        assert!(!reader.readable());

        child.get(w).unwrap().write(b"z", &signals).unwrap();
        child.close(w).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf, &signals), Ok(1));
        // every writer is gone now
        assert_eq!(reader.read(&mut buf, &signals), Ok(0));
    }

    #[test]
    fn close_on_exec_only_drops_marked_slots() {
        let mut table = FileTable::with_stdio(&Stdio::capture());
        let fd = table.insert(null()).unwrap();
        table.set_cloexec(fd, true).unwrap();
        table.close_on_exec();
        assert_eq!(table.get(fd).err(), Some(Errno::EBADF));
        assert_eq!(table.open_count(), 3);
    }

    #[test]
    fn dup_shares_description() {
        let mut table = FileTable::new();
        let fd = table.insert(null()).unwrap();
        let desc = table.get(fd).unwrap();
        let copy = table.insert_from(10, Arc::clone(&desc), false).unwrap();
        assert_eq!(copy, 10);
        table.get(fd).unwrap().set_status(StatusFlags::NONBLOCK);
        assert!(table.get(copy).unwrap().status().contains(StatusFlags::NONBLOCK));
        assert_eq!(table.set_umask(0o077), 0o022);
    }
}
