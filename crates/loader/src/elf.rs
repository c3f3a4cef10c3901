use std::fs;
use std::path::Path;

use goblin::elf::header::EM_MIPS;
use goblin::elf::program_header::{PT_INTERP, PT_LOAD};
use goblin::elf::sym::{STT_FUNC, STT_OBJECT};
use goblin::elf::Elf;
use log::debug;
use vm::SymbolTable;

use crate::image::{ProgramImage, Segment};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed ELF: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("not a MIPS executable (machine {0})")]
    NotMips(u16),
    #[error("not a 32-bit big-endian image")]
    WrongClass,
    #[error("dynamically linked images are not supported")]
    Dynamic,
    #[error("no loadable segments")]
    NoSegments,
    #[error("segment at 0x{vaddr:x} lies outside the file")]
    Truncated { vaddr: u64 },
}

/// Parse a static big-endian MIPS executable.
pub fn parse_elf_from_bytes(bytes: &[u8]) -> Result<ProgramImage, LoadError> {
    let elf = Elf::parse(bytes)?;

    if elf.header.e_machine != EM_MIPS {
        return Err(LoadError::NotMips(elf.header.e_machine));
    }
    if elf.is_64 || elf.little_endian {
        return Err(LoadError::WrongClass);
    }
    if elf.program_headers.iter().any(|ph| ph.p_type == PT_INTERP) {
        return Err(LoadError::Dynamic);
    }

    let mut segments = Vec::new();
    for ph in elf.program_headers.iter().filter(|ph| ph.p_type == PT_LOAD) {
        let start = ph.p_offset as usize;
        let data = start
            .checked_add(ph.p_filesz as usize)
            .and_then(|end| bytes.get(start..end))
            .ok_or(LoadError::Truncated { vaddr: ph.p_vaddr })?;
        debug!(
            "segment 0x{:08x} file={} mem={}",
            ph.p_vaddr, ph.p_filesz, ph.p_memsz
        );
        segments.push(Segment {
            vaddr: ph.p_vaddr as u32,
            data: data.to_vec(),
            memsz: ph.p_memsz.max(ph.p_filesz) as u32,
        });
    }
    if segments.is_empty() {
        return Err(LoadError::NoSegments);
    }

    let mut symbols = SymbolTable::new();
    for sym in elf.syms.iter() {
        let kind = sym.st_type();
        if sym.st_value == 0 || (kind != STT_FUNC && kind != STT_OBJECT) {
            continue;
        }
        if let Some(name) = elf.strtab.get_at(sym.st_name).filter(|n| !n.is_empty()) {
            symbols.insert(sym.st_value as u32, name);
        }
    }
    debug!("entry 0x{:08x}, {} symbols", elf.entry, symbols.len());

    Ok(ProgramImage {
        entry: elf.entry as u32,
        segments,
        symbols,
    })
}

/// Read and parse an executable from the host file system.
pub fn load_elf(path: &Path) -> Result<ProgramImage, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_elf_from_bytes(&bytes)
}
