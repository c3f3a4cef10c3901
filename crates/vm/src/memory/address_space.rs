use std::sync::Arc;

use log::debug;

use super::page::{share_count, Frame, Page, PageAllocator, PageStats};
use super::{
    page_index, pages_spanned, MemoryError, LOW_GUARD, MMAP_MAX_PAGES, PAGE_COUNT,
    PAGE_OFFSET_MASK, PAGE_SHIFT, PAGE_SIZE, STACK_TOP,
};

type Result<T> = std::result::Result<T, MemoryError>;

/// One process's view of guest memory.
///
/// Slots are `None` when unmapped. Loads read through shared pages; stores
/// privatize the touched page first, so a forked sibling never sees them.
#[derive(Debug)]
pub struct AddressSpace {
    slots: Vec<Option<Page>>,
    allocator: PageAllocator,
    brk: u32,
}

impl AddressSpace {
    pub fn new(allocator: PageAllocator) -> Self {
        Self {
            slots: vec![None; PAGE_COUNT],
            allocator,
            brk: 0,
        }
    }

    pub fn allocator(&self) -> &PageAllocator {
        &self.allocator
    }

    pub fn stats(&self) -> PageStats {
        self.allocator.stats()
    }

    /// True when the page holding `addr` is mapped.
    pub fn bound(&self, addr: u32) -> bool {
        self.frame(addr).is_ok()
    }

    /// Number of mapped page slots.
    pub fn mapped_pages(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// How many other address spaces hold the page at `addr`.
    pub fn share_count(&self, addr: u32) -> Option<u8> {
        let index = page_index(addr)?;
        self.slots[index].as_ref().map(share_count)
    }

    fn frame(&self, addr: u32) -> Result<&Frame> {
        page_index(addr)
            .and_then(|index| self.slots[index].as_deref())
            .ok_or(MemoryError::Unbound(addr))
    }

    /// Writable frame for `addr`, copying it out of any sharing first.
    fn frame_mut(&mut self, addr: u32) -> Result<&mut Frame> {
        let slot = page_index(addr)
            .and_then(|index| self.slots[index].as_mut())
            .ok_or(MemoryError::Unbound(addr))?;
        Ok(Arc::make_mut(slot))
    }

    #[inline]
    fn check_align(addr: u32, size: u32) -> Result<()> {
        if addr & (size - 1) != 0 {
            return Err(MemoryError::Misaligned { addr, size });
        }
        Ok(())
    }

    pub fn load_byte(&self, addr: u32) -> Result<u8> {
        let off = (addr & PAGE_OFFSET_MASK) as usize;
        Ok(self.frame(addr)?.bytes()[off])
    }

    pub fn load_half(&self, addr: u32) -> Result<u16> {
        Self::check_align(addr, 2)?;
        let off = (addr & PAGE_OFFSET_MASK) as usize;
        let bytes = self.frame(addr)?.bytes();
        Ok(u16::from_be_bytes([bytes[off], bytes[off + 1]]))
    }

    pub fn load_word(&self, addr: u32) -> Result<u32> {
        Self::check_align(addr, 4)?;
        let off = (addr & PAGE_OFFSET_MASK) as usize;
        let bytes = self.frame(addr)?.bytes();
        Ok(u32::from_be_bytes([
            bytes[off],
            bytes[off + 1],
            bytes[off + 2],
            bytes[off + 3],
        ]))
    }

    pub fn store_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        let off = (addr & PAGE_OFFSET_MASK) as usize;
        self.frame_mut(addr)?.bytes_mut()[off] = value;
        Ok(())
    }

    pub fn store_half(&mut self, addr: u32, value: u16) -> Result<()> {
        Self::check_align(addr, 2)?;
        let off = (addr & PAGE_OFFSET_MASK) as usize;
        self.frame_mut(addr)?.bytes_mut()[off..off + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn store_word(&mut self, addr: u32, value: u32) -> Result<()> {
        Self::check_align(addr, 4)?;
        let off = (addr & PAGE_OFFSET_MASK) as usize;
        self.frame_mut(addr)?.bytes_mut()[off..off + 4].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Fill `buf` from guest memory starting at `addr`.
    pub fn read_into(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let mut done = 0usize;
        while done < buf.len() {
            let at = addr.wrapping_add(done as u32);
            let off = (at & PAGE_OFFSET_MASK) as usize;
            let chunk = (PAGE_SIZE as usize - off).min(buf.len() - done);
            let bytes = self.frame(at)?.bytes();
            buf[done..done + chunk].copy_from_slice(&bytes[off..off + chunk]);
            done += chunk;
        }
        Ok(())
    }

    pub fn load_bytes(&self, addr: u32, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(addr, &mut buf)?;
        Ok(buf)
    }

    pub fn store_bytes(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let mut done = 0usize;
        while done < data.len() {
            let at = addr.wrapping_add(done as u32);
            let off = (at & PAGE_OFFSET_MASK) as usize;
            let chunk = (PAGE_SIZE as usize - off).min(data.len() - done);
            self.frame_mut(at)?.bytes_mut()[off..off + chunk]
                .copy_from_slice(&data[done..done + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Read a NUL-terminated string. Invalid UTF-8 is replaced.
    pub fn load_string(&self, addr: u32) -> Result<String> {
        let mut raw = Vec::new();
        let mut at = addr;
        loop {
            let b = self.load_byte(at)?;
            if b == 0 {
                break;
            }
            raw.push(b);
            at = at.wrapping_add(1);
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Read a NULL-terminated array of string pointers, as in argv.
    pub fn load_string_array(&self, addr: u32) -> Result<Vec<String>> {
        let mut out = Vec::new();
        if addr == 0 {
            return Ok(out);
        }
        let mut at = addr;
        loop {
            let ptr = self.load_word(at)?;
            if ptr == 0 {
                return Ok(out);
            }
            out.push(self.load_string(ptr)?);
            at = at.wrapping_add(4);
        }
    }

    pub fn load_words(&self, addr: u32, count: usize) -> Result<Vec<u32>> {
        (0..count)
            .map(|i| self.load_word(addr.wrapping_add(4 * i as u32)))
            .collect()
    }

    pub fn store_words(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        for (i, word) in words.iter().enumerate() {
            self.store_word(addr.wrapping_add(4 * i as u32), *word)?;
        }
        Ok(())
    }

    /// Map pages for `len` bytes at `addr` and return the base address.
    ///
    /// An `addr` inside the first page means "anywhere": the first free run
    /// above the stack top is used, and its length is recorded in the aux
    /// byte of the anchor page. Pages already mapped in a fixed range are
    /// left as they are.
    pub fn alloc(&mut self, addr: u32, len: u32) -> Result<u32> {
        if addr < PAGE_SIZE {
            let pages = pages_spanned(0, len).max(1);
            if pages > MMAP_MAX_PAGES {
                return Err(MemoryError::Exhausted { pages });
            }
            let first = self
                .find_free_run(page_index(STACK_TOP).unwrap_or(0), pages as usize)
                .ok_or(MemoryError::Exhausted { pages })?;
            for index in first..first + pages as usize {
                self.slots[index] = Some(self.allocator.allocate());
            }
            let base = (first as u32) << PAGE_SHIFT;
            self.frame_mut(base)?.set_aux(pages as u8);
            debug!("alloc {} pages at 0x{:08x}", pages, base);
            return Ok(base);
        }
        if addr < LOW_GUARD {
            return Err(MemoryError::Reserved(addr));
        }

        let pages = pages_spanned(addr, len).max(1);
        let first = (addr >> PAGE_SHIFT) as usize;
        if first + pages as usize > PAGE_COUNT {
            return Err(MemoryError::Exhausted { pages });
        }
        let fresh_anchor = self.slots[first].is_none();
        for index in first..first + pages as usize {
            if self.slots[index].is_none() {
                self.slots[index] = Some(self.allocator.allocate());
            }
        }
        if fresh_anchor {
            self.frame_mut(addr)?.set_aux(pages.min(u8::MAX as u32) as u8);
        }
        debug!("alloc {} pages at 0x{:08x}", pages, addr);
        Ok(addr)
    }

    fn find_free_run(&self, from: usize, pages: usize) -> Option<usize> {
        let mut start = from;
        while start + pages <= PAGE_COUNT {
            match self.slots[start..start + pages]
                .iter()
                .rposition(|slot| slot.is_some())
            {
                Some(taken) => start += taken + 1,
                None => return Some(start),
            }
        }
        None
    }

    /// Unmap the pages covering `len` bytes at `addr`. A zero length frees
    /// the run anchored at `addr`.
    pub fn free(&mut self, addr: u32, len: u32) -> Result<()> {
        let first = page_index(addr).ok_or(MemoryError::NotAllocated(addr))?;
        let pages = if len == 0 {
            let anchor = self.frame(addr).map_err(|_| MemoryError::NotAllocated(addr))?;
            anchor.aux().max(1) as usize
        } else {
            pages_spanned(addr, len) as usize
        };
        let end = (first + pages).min(PAGE_COUNT);
        if let Some(index) = (first..end).find(|&i| self.slots[i].is_none()) {
            return Err(MemoryError::NotAllocated((index as u32) << PAGE_SHIFT));
        }
        for slot in &mut self.slots[first..end] {
            *slot = None;
        }
        debug!("free {} pages at 0x{:08x}", end - first, addr);
        Ok(())
    }

    pub fn brk(&self) -> u32 {
        self.brk
    }

    /// Place the initial break without mapping anything.
    pub fn init_brk(&mut self, addr: u32) {
        self.brk = addr;
    }

    /// Move the break. Zero queries it; growth maps the pages between the
    /// old and new break; shrinking only moves it.
    pub fn set_brk(&mut self, new: u32) -> Result<u32> {
        if new == 0 || new < LOW_GUARD {
            return Ok(self.brk);
        }
        if new > self.brk {
            let start = self.brk.max(LOW_GUARD);
            self.alloc(start, new - start)?;
        }
        self.brk = new;
        Ok(self.brk)
    }

    /// Share every mapped page with a new address space.
    pub fn fork(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            allocator: self.allocator.clone(),
            brk: self.brk,
        }
    }

    /// Drop every mapping, as exec does before loading a new image.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.brk = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> AddressSpace {
        AddressSpace::new(PageAllocator::new())
    }

    #[test]
    fn unbound_access_fails() {
        let mut mem = space();
        assert!(!mem.bound(0x40_0000));
        assert_eq!(mem.load_word(0x40_0000), Err(MemoryError::Unbound(0x40_0000)));
        assert_eq!(mem.store_byte(0, 1), Err(MemoryError::Unbound(0)));
    }

    #[test]
    fn big_endian_and_alignment() {
        let mut mem = space();
        mem.alloc(0x40_0000, 16).unwrap();
        mem.store_word(0x40_0000, 0x1122_3344).unwrap();
        assert_eq!(mem.load_byte(0x40_0000).unwrap(), 0x11);
        assert_eq!(mem.load_half(0x40_0002).unwrap(), 0x3344);
        assert_eq!(
            mem.load_word(0x40_0002),
            Err(MemoryError::Misaligned { addr: 0x40_0002, size: 4 })
        );
        assert!(mem.store_half(0x40_0001, 0).is_err());
    }

    #[test]
    fn bulk_transfer_crosses_pages() {
        let mut mem = space();
        mem.alloc(0x40_0000, 2 * PAGE_SIZE).unwrap();
        let data: Vec<u8> = (0..64).collect();
        mem.store_bytes(0x40_ffe0, &data).unwrap();
        assert_eq!(mem.load_bytes(0x40_ffe0, 64).unwrap(), data);
        mem.store_bytes(0x40_1000, b"hello\0").unwrap();
        assert_eq!(mem.load_string(0x40_1000).unwrap(), "hello");
    }

    #[test]
    fn anonymous_runs_are_anchored_above_stack() {
        let mut mem = space();
        let a = mem.alloc(0, 3 * PAGE_SIZE).unwrap();
        assert_eq!(a, STACK_TOP);
        let b = mem.alloc(0, 1).unwrap();
        assert_eq!(b, STACK_TOP + 3 * PAGE_SIZE);

        mem.free(a, 0).unwrap();
        assert!(!mem.bound(a + 2 * PAGE_SIZE));
        assert!(mem.bound(b));
        assert_eq!(mem.alloc(0, PAGE_SIZE).unwrap(), a);

        assert_eq!(
            mem.alloc(0, (MMAP_MAX_PAGES + 1) * PAGE_SIZE),
            Err(MemoryError::Exhausted { pages: MMAP_MAX_PAGES + 1 })
        );
        assert_eq!(mem.alloc(0x0001_0000, 4), Err(MemoryError::Reserved(0x0001_0000)));
    }

    #[test]
    fn freeing_unmapped_pages_is_an_error() {
        let mut mem = space();
        assert_eq!(mem.free(0x40_0000, 4), Err(MemoryError::NotAllocated(0x40_0000)));
    }

    #[test]
    fn brk_grows_from_previous_break() {
        let mut mem = space();
        mem.alloc(0x40_0000, 0x100).unwrap();
        mem.init_brk(0x40_0100);
        assert_eq!(mem.set_brk(0).unwrap(), 0x40_0100);
        assert_eq!(mem.set_brk(0x42_0000).unwrap(), 0x42_0000);
        assert!(mem.bound(0x41_fffc));
        assert_eq!(mem.set_brk(0x41_0000).unwrap(), 0x41_0000);
        assert!(mem.bound(0x41_fffc));
    }

    #[test]
    fn fork_shares_until_written() {
        let mut parent = space();
        parent.alloc(0x40_0000, 8).unwrap();
        parent.store_word(0x40_0000, 1).unwrap();

        let mut child = parent.fork();
        assert_eq!(parent.share_count(0x40_0000), Some(1));

        child.store_word(0x40_0000, 2).unwrap();
        assert_eq!(parent.load_word(0x40_0000).unwrap(), 1);
        assert_eq!(child.load_word(0x40_0000).unwrap(), 2);
        assert_eq!(parent.share_count(0x40_0000), Some(0));
        assert_eq!(child.share_count(0x40_0000), Some(0));
    }
}
