use vm::SymbolTable;

/// One loadable region. `memsz` may exceed `data.len()`; the rest is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub vaddr: u32,
    pub data: Vec<u8>,
    pub memsz: u32,
}

impl Segment {
    pub fn new(vaddr: u32, data: Vec<u8>) -> Self {
        let memsz = data.len() as u32;
        Self { vaddr, data, memsz }
    }

    /// A segment with `extra` zero bytes after its file contents.
    pub fn with_bss(vaddr: u32, data: Vec<u8>, extra: u32) -> Self {
        let memsz = data.len() as u32 + extra;
        Self { vaddr, data, memsz }
    }

    pub fn end(&self) -> u32 {
        self.vaddr.saturating_add(self.memsz)
    }
}

/// Everything the kernel needs to start a static program.
#[derive(Debug, Clone, Default)]
pub struct ProgramImage {
    pub entry: u32,
    pub segments: Vec<Segment>,
    pub symbols: SymbolTable,
}

impl ProgramImage {
    /// A single text segment holding `words`, entered at its first word.
    pub fn from_words(base: u32, words: &[u32]) -> Self {
        Self {
            entry: base,
            segments: vec![Segment::new(base, vm::asm::to_bytes(words))],
            symbols: SymbolTable::new(),
        }
    }

    /// Initial program break: the end of the highest segment.
    pub fn break_address(&self) -> u32 {
        self.segments.iter().map(Segment::end).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_is_highest_segment_end() {
        let mut image = ProgramImage::from_words(0x40_0000, &[0, 0]);
        assert_eq!(image.break_address(), 0x40_0008);
        image.segments.push(Segment::with_bss(0x41_0000, vec![1, 2, 3], 0x100));
        assert_eq!(image.break_address(), 0x41_0103);
        assert_eq!(ProgramImage::default().break_address(), 0);
    }
}
