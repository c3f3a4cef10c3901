pub mod elf;
pub use elf::{load_elf, parse_elf_from_bytes, LoadError};

pub mod image;
pub use image::{ProgramImage, Segment};

pub mod writer;
pub use writer::write_elf;
