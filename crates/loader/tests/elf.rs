use loader::{parse_elf_from_bytes, write_elf, LoadError, ProgramImage, Segment};
use vm::asm::{addiu, li, SYSCALL};
use vm::registers::Register::*;

const BASE: u32 = 0x0040_0000;

fn sample() -> ProgramImage {
    let mut image = ProgramImage::from_words(BASE, &[li(A0, 3), li(V0, 4001), SYSCALL]);
    image.entry = BASE + 4;
    image
        .segments
        .push(Segment::with_bss(0x0041_0000, b"data".to_vec(), 60));
    image.symbols.insert(BASE, "__start");
    image.symbols.insert(BASE + 4, "main");
    image
}

#[test]
fn round_trip_through_elf() {
    let bytes = write_elf(&sample());
    let image = parse_elf_from_bytes(&bytes).unwrap();

    assert_eq!(image.entry, BASE + 4);
    assert_eq!(image.segments.len(), 2);
    assert_eq!(image.segments[0].vaddr, BASE);
    assert_eq!(image.segments[0].data.len(), 12);
    assert_eq!(image.segments[1].data, b"data");
    assert_eq!(image.segments[1].memsz, 64);
    assert_eq!(image.break_address(), 0x0041_0040);

    assert_eq!(image.symbols.address_of("main"), Some(BASE + 4));
    assert_eq!(image.symbols.describe(BASE + 8), "main+0x4");
}

#[test]
fn image_without_symbols_loads() {
    let image = ProgramImage::from_words(BASE, &[addiu(T0, Zero, 1)]);
    let parsed = parse_elf_from_bytes(&write_elf(&image)).unwrap();
    assert!(parsed.symbols.is_empty());
    assert_eq!(parsed.segments[0].data, image.segments[0].data);
}

#[test]
fn rejects_foreign_machines_and_byte_orders() {
    let mut bytes = write_elf(&sample());
    bytes[18..20].copy_from_slice(&62u16.to_be_bytes()); // x86-64
    assert!(matches!(parse_elf_from_bytes(&bytes), Err(LoadError::NotMips(62))));

    assert!(matches!(parse_elf_from_bytes(b"not an elf"), Err(LoadError::Parse(_))));
}

#[test]
fn rejects_dynamic_images() {
    let mut bytes = write_elf(&sample());
    // turn the first program header into PT_INTERP
    bytes[52..56].copy_from_slice(&3u32.to_be_bytes());
    assert!(matches!(parse_elf_from_bytes(&bytes), Err(LoadError::Dynamic)));
}

#[test]
fn rejects_truncated_segments() {
    let mut bytes = write_elf(&ProgramImage::from_words(BASE, &[0; 4]));
    bytes.truncate(bytes.len() - 4);
    assert!(matches!(
        parse_elf_from_bytes(&bytes),
        Err(LoadError::Truncated { .. }) | Err(LoadError::Parse(_))
    ));
}
