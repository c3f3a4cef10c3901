//! Guest structs laid out by the constant table.
//!
//! Field offsets and widths come from [`ConstantTable`], so a table file
//! for another C library changes the layouts without code changes. Fields
//! wider than eight bytes (such as `sa_mask`) only carry their first word.

use log::debug;
use types::{ConstantTable, Errno};
use vm::AddressSpace;

use super::efault;
use crate::files::{FileStat, FsStat};

/// Builds one struct image and stores it in a single write.
pub struct StructWriter<'a> {
    constants: &'a ConstantTable,
    name: &'static str,
    bytes: Vec<u8>,
}

impl<'a> StructWriter<'a> {
    pub fn new(constants: &'a ConstantTable, name: &'static str) -> Result<Self, Errno> {
        let size = constants.size_of(name).ok_or_else(|| {
            debug!("no layout for struct {}", name);
            Errno::ENOSYS
        })?;
        Ok(Self {
            constants,
            name,
            bytes: vec![0; size as usize],
        })
    }

    /// Set a numeric field, big-endian in its declared width. Fields the
    /// table does not know are skipped.
    pub fn set(&mut self, field: &str, value: u64) -> &mut Self {
        let Some(f) = self.constants.field(self.name, field) else {
            debug!("struct {} has no field {}", self.name, field);
            return self;
        };
        let start = f.offset as usize;
        let width = match f.size {
            1 | 2 | 4 | 8 => f.size as usize,
            _ => 4,
        };
        let be = value.to_be_bytes();
        if let Some(dst) = self.bytes.get_mut(start..start + width) {
            dst.copy_from_slice(&be[8 - width..]);
        }
        self
    }

    /// Copy `text` into a character-array field, NUL padded.
    pub fn set_str(&mut self, field: &str, text: &str) -> &mut Self {
        if let Some(f) = self.constants.field(self.name, field) {
            let start = f.offset as usize;
            let len = text.len().min(f.size.saturating_sub(1) as usize);
            if let Some(dst) = self.bytes.get_mut(start..start + len) {
                dst.copy_from_slice(&text.as_bytes()[..len]);
            }
        }
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn store(&self, memory: &mut AddressSpace, addr: u32) -> Result<(), Errno> {
        memory.store_bytes(addr, &self.bytes).map_err(efault)
    }
}

/// Reads fields out of a guest struct.
pub struct StructReader<'a> {
    constants: &'a ConstantTable,
    name: &'static str,
    bytes: Vec<u8>,
}

impl<'a> StructReader<'a> {
    pub fn load(
        constants: &'a ConstantTable,
        name: &'static str,
        memory: &AddressSpace,
        addr: u32,
    ) -> Result<Self, Errno> {
        let size = constants.size_of(name).ok_or(Errno::ENOSYS)?;
        let bytes = memory.load_bytes(addr, size as usize).map_err(efault)?;
        Ok(Self { constants, name, bytes })
    }

    pub fn get(&self, field: &str) -> u64 {
        let Some(f) = self.constants.field(self.name, field) else {
            return 0;
        };
        let start = f.offset as usize;
        let width = match f.size {
            1 | 2 | 4 | 8 => f.size as usize,
            _ => 4,
        };
        self.bytes
            .get(start..start + width)
            .map_or(0, |src| src.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }
}

/// stat or stat64 at `addr`.
pub fn write_stat(
    constants: &ConstantTable,
    memory: &mut AddressSpace,
    addr: u32,
    stat: &FileStat,
    wide: bool,
) -> Result<(), Errno> {
    let mut w = StructWriter::new(constants, if wide { "stat64" } else { "stat" })?;
    w.set("st_dev", stat.dev)
        .set("st_ino", stat.ino)
        .set("st_mode", stat.mode as u64)
        .set("st_nlink", stat.nlink as u64)
        .set("st_uid", stat.uid as u64)
        .set("st_gid", stat.gid as u64)
        .set("st_rdev", stat.rdev)
        .set("st_size", stat.size)
        .set("st_atime", stat.atime as u64)
        .set("st_mtime", stat.mtime as u64)
        .set("st_ctime", stat.ctime as u64)
        .set("st_blksize", stat.blksize as u64)
        .set("st_blocks", stat.blocks);
    w.store(memory, addr)
}

/// statfs or statfs64 at `addr`.
pub fn write_statfs(
    constants: &ConstantTable,
    memory: &mut AddressSpace,
    addr: u32,
    fs: &FsStat,
    wide: bool,
) -> Result<(), Errno> {
    let mut w = StructWriter::new(constants, if wide { "statfs64" } else { "statfs" })?;
    w.set("f_type", fs.kind as u64)
        .set("f_bsize", fs.bsize as u64)
        .set("f_frsize", fs.bsize as u64)
        .set("f_blocks", fs.blocks)
        .set("f_bfree", fs.bfree)
        .set("f_bavail", fs.bavail)
        .set("f_files", fs.files)
        .set("f_ffree", fs.ffree)
        .set("f_namelen", fs.namelen as u64);
    w.store(memory, addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm::PageAllocator;

    #[test]
    fn stat64_fields_land_at_table_offsets() {
        let constants = ConstantTable::builtin();
        let mut memory = AddressSpace::new(PageAllocator::new());
        memory.alloc(0x40_0000, 0x1000).unwrap();
        let stat = FileStat {
            ino: 0x1_0000_0002,
            mode: 0o100644,
            size: 1234,
            blocks: 8,
            ..FileStat::default()
        };
        write_stat(&constants, &mut memory, 0x40_0000, &stat, true).unwrap();
        assert_eq!(memory.load_word(0x40_0010).unwrap(), 1);
        assert_eq!(memory.load_word(0x40_0014).unwrap(), 2);
        assert_eq!(memory.load_word(0x40_0018).unwrap(), 0o100644);
        assert_eq!(memory.load_word(0x40_003c).unwrap(), 1234);
        assert_eq!(memory.load_word(0x40_0064).unwrap(), 8);

        write_stat(&constants, &mut memory, 0x40_0100, &stat, false).unwrap();
        assert_eq!(memory.load_word(0x40_0114).unwrap(), 0o100644);
        assert_eq!(memory.load_word(0x40_0130).unwrap(), 1234);
    }

    #[test]
    fn reader_sees_what_writer_stored() {
        let constants = ConstantTable::builtin();
        let mut memory = AddressSpace::new(PageAllocator::new());
        memory.alloc(0x40_0000, 0x1000).unwrap();
        let mut w = StructWriter::new(&constants, "sigaction").unwrap();
        w.set("sa_flags", 4).set("sa_handler", 0x40_1230).set("sa_mask", 0x8000);
        w.store(&mut memory, 0x40_0000).unwrap();

        let r = StructReader::load(&constants, "sigaction", &memory, 0x40_0000).unwrap();
        assert_eq!(r.get("sa_handler"), 0x40_1230);
        assert_eq!(r.get("sa_mask"), 0x8000);
        assert_eq!(r.get("sa_flags"), 4);
        assert_eq!(memory.load_word(0x40_0008).unwrap(), 0x8000);
    }

    #[test]
    fn strings_are_truncated_to_field() {
        let constants = ConstantTable::builtin();
        let mut w = StructWriter::new(&constants, "utsname").unwrap();
        w.set_str("sysname", "Linux").set_str("machine", "mips");
        assert_eq!(&w.bytes()[..6], b"Linux\0");
        assert_eq!(&w.bytes()[260..265], b"mips\0");
    }
}
