//! Paged guest memory.
//!
//! The 512 MiB guest space is split into 64 KiB pages. Each process owns an
//! [`AddressSpace`], a sparse table of page slots; the frames behind the slots
//! are counted handles that fork shares and the first write privatizes.

mod address_space;
mod page;

pub use address_space::AddressSpace;
pub use page::{Frame, Page, PageAllocator, PageStats};

pub const PAGE_SHIFT: u32 = 16;
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;
pub const PAGE_OFFSET_MASK: u32 = PAGE_SIZE - 1;
/// Number of page slots in one address space.
pub const PAGE_COUNT: usize = 8192;

/// Nothing is ever mapped below this address.
pub const LOW_GUARD: u32 = 0x0040_0000;
/// Initial stack pointer; the stack grows down from here.
pub const STACK_TOP: u32 = 0x1800_0000;
pub const DEFAULT_STACK_SIZE: u32 = 4 * 65536;
/// Largest run a single anonymous allocation may claim.
pub const MMAP_MAX_PAGES: u32 = 100;

/// Page-level failures. The engine turns these into faults, the syscall
/// layer into `EFAULT`/`ENOMEM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("address 0x{0:08x} is not mapped")]
    Unbound(u32),
    #[error("misaligned {size}-byte access at 0x{addr:08x}")]
    Misaligned { addr: u32, size: u32 },
    #[error("no room for {pages} pages")]
    Exhausted { pages: u32 },
    #[error("address 0x{0:08x} is in the reserved low region")]
    Reserved(u32),
    #[error("page at 0x{0:08x} was not allocated")]
    NotAllocated(u32),
}

/// Page slot of an address, if it falls inside the guest space.
#[inline]
pub fn page_index(addr: u32) -> Option<usize> {
    let index = (addr >> PAGE_SHIFT) as usize;
    (index < PAGE_COUNT).then_some(index)
}

/// Number of pages needed to cover `len` bytes starting at `addr`.
pub fn pages_spanned(addr: u32, len: u32) -> u32 {
    if len == 0 {
        return 0;
    }
    let first = addr >> PAGE_SHIFT;
    let last = (addr as u64 + len as u64 - 1) >> PAGE_SHIFT;
    (last - first as u64 + 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans() {
        assert_eq!(pages_spanned(0x40_0000, 0), 0);
        assert_eq!(pages_spanned(0x40_0000, 1), 1);
        assert_eq!(pages_spanned(0x40_ffff, 2), 2);
        assert_eq!(pages_spanned(0x40_0000, PAGE_SIZE), 1);
        assert_eq!(page_index(0x2000_0000), None);
        assert_eq!(page_index(STACK_TOP - 4), Some(0x17ff));
    }
}
