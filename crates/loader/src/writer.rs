//! Serialize a [`ProgramImage`] as a static ELF32 big-endian MIPS file.
//!
//! Only what the loader reads back is emitted: program headers for each
//! segment and, when there are symbols, a symbol table with its string
//! tables. Handy for building guest executables without a cross toolchain.

use crate::image::ProgramImage;

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;
const SHDR_SIZE: usize = 40;
const SYM_SIZE: usize = 16;

const PT_LOAD: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHN_ABS: u16 = 0xfff1;
const STB_GLOBAL_FUNC: u8 = 0x12;

fn put16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn align4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

pub fn write_elf(image: &ProgramImage) -> Vec<u8> {
    let phnum = image.segments.len();
    let mut body = Vec::new();
    let data_start = EHDR_SIZE + phnum * PHDR_SIZE;

    // segment bytes
    let mut offsets = Vec::with_capacity(phnum);
    for seg in &image.segments {
        offsets.push(data_start + body.len());
        body.extend_from_slice(&seg.data);
        align4(&mut body);
    }

    // symbol table, string table, section name table
    let mut sections: Vec<[u32; 10]> = Vec::new();
    let mut shstrndx = 0u16;
    if !image.symbols.is_empty() {
        let mut strtab = vec![0u8];
        let mut symtab = vec![0u8; SYM_SIZE];
        for (addr, name) in image.symbols.iter() {
            put32(&mut symtab, strtab.len() as u32);
            put32(&mut symtab, addr);
            put32(&mut symtab, 0);
            symtab.push(STB_GLOBAL_FUNC);
            symtab.push(0);
            put16(&mut symtab, SHN_ABS);
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
        }
        let shstrtab = b"\0.symtab\0.strtab\0.shstrtab\0";

        let symtab_off = data_start + body.len();
        body.extend_from_slice(&symtab);
        let strtab_off = data_start + body.len();
        body.extend_from_slice(&strtab);
        align4(&mut body);
        let shstrtab_off = data_start + body.len();
        body.extend_from_slice(shstrtab);
        align4(&mut body);

        sections.push([0; 10]);
        sections.push([1, SHT_SYMTAB, 0, 0, symtab_off as u32, symtab.len() as u32, 2, 1, 4, SYM_SIZE as u32]);
        sections.push([9, SHT_STRTAB, 0, 0, strtab_off as u32, strtab.len() as u32, 0, 0, 1, 0]);
        sections.push([17, SHT_STRTAB, 0, 0, shstrtab_off as u32, shstrtab.len() as u32, 0, 0, 1, 0]);
        shstrndx = 3;
    }
    let shoff = if sections.is_empty() { 0 } else { data_start + body.len() };

    let mut out = Vec::with_capacity(shoff + sections.len() * SHDR_SIZE);
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 2, 1]);
    out.resize(16, 0);
    put16(&mut out, 2); // ET_EXEC
    put16(&mut out, 8); // EM_MIPS
    put32(&mut out, 1);
    put32(&mut out, image.entry);
    put32(&mut out, EHDR_SIZE as u32);
    put32(&mut out, shoff as u32);
    put32(&mut out, 0x1000); // EF_MIPS_ABI_O32
    put16(&mut out, EHDR_SIZE as u16);
    put16(&mut out, PHDR_SIZE as u16);
    put16(&mut out, phnum as u16);
    put16(&mut out, SHDR_SIZE as u16);
    put16(&mut out, sections.len() as u16);
    put16(&mut out, shstrndx);

    for (seg, offset) in image.segments.iter().zip(offsets) {
        for field in [
            PT_LOAD,
            offset as u32,
            seg.vaddr,
            seg.vaddr,
            seg.data.len() as u32,
            seg.memsz,
            7,
            0x1000,
        ] {
            put32(&mut out, field);
        }
    }
    out.extend_from_slice(&body);
    for section in &sections {
        for field in section {
            put32(&mut out, *field);
        }
    }
    out
}
