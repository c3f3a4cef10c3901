use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::PAGE_SIZE;

/// Upper bound on recycled frames kept around for reuse.
const POOL_CAPACITY: usize = 128;
/// Share counts saturate here when reported.
const SHARE_MAX: usize = 127;

#[derive(Debug, Default)]
struct Pool {
    free: Mutex<Vec<Box<[u8]>>>,
    live: AtomicUsize,
}

impl Pool {
    fn take(self: &Arc<Self>, zeroed: bool) -> Frame {
        let recycled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let bytes = match recycled {
            Some(mut bytes) => {
                if zeroed {
                    bytes.fill(0);
                }
                bytes
            }
            None => vec![0u8; PAGE_SIZE as usize].into_boxed_slice(),
        };
        self.live.fetch_add(1, Ordering::Relaxed);
        Frame {
            bytes,
            aux: 0,
            pool: Arc::clone(self),
        }
    }

    fn give(&self, bytes: Box<[u8]>) {
        self.live.fetch_sub(1, Ordering::Relaxed);
        if bytes.len() != PAGE_SIZE as usize {
            return;
        }
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < POOL_CAPACITY {
            free.push(bytes);
        }
    }
}

/// One page of guest memory plus its auxiliary byte.
///
/// The aux byte of the first page of a multi-page allocation holds the
/// number of pages in that run, so a later free can find its extent.
#[derive(Debug)]
pub struct Frame {
    bytes: Box<[u8]>,
    aux: u8,
    pool: Arc<Pool>,
}

impl Frame {
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn aux(&self) -> u8 {
        self.aux
    }

    pub fn set_aux(&mut self, aux: u8) {
        self.aux = aux;
    }
}

/// Privatizing a shared page copies it into a fresh frame from the same pool.
impl Clone for Frame {
    fn clone(&self) -> Self {
        let mut copy = self.pool.take(false);
        copy.bytes.copy_from_slice(&self.bytes);
        copy.aux = self.aux;
        copy
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        let bytes = mem::take(&mut self.bytes);
        self.pool.give(bytes);
    }
}

/// A counted handle on a frame. Address spaces that hold the same `Page`
/// see the same bytes until one of them writes.
pub type Page = Arc<Frame>;

/// Number of other holders of this page, saturating at 127.
pub fn share_count(page: &Page) -> u8 {
    (Arc::strong_count(page) - 1).min(SHARE_MAX) as u8
}

/// Snapshot of the allocator's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    pub allocated: usize,
    pub free: usize,
}

impl fmt::Display for PageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pages allocated={} free={}", self.allocated, self.free)
    }
}

/// Hands out zeroed frames and recycles released ones.
///
/// Cloning the allocator shares the pool, so every process forked from one
/// program draws from and returns to the same set of frames.
#[derive(Debug, Clone, Default)]
pub struct PageAllocator {
    pool: Arc<Pool>,
}

impl PageAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, zero-filled, unshared page.
    pub fn allocate(&self) -> Page {
        Arc::new(self.pool.take(true))
    }

    pub fn stats(&self) -> PageStats {
        PageStats {
            allocated: self.pool.live.load(Ordering::Relaxed),
            free: self
                .pool
                .free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_frames_are_recycled_zeroed() {
        let alloc = PageAllocator::new();
        let mut page = alloc.allocate();
        Arc::make_mut(&mut page).bytes_mut()[7] = 0xaa;
        assert_eq!(alloc.stats(), PageStats { allocated: 1, free: 0 });

        drop(page);
        assert_eq!(alloc.stats(), PageStats { allocated: 0, free: 1 });

        let page = alloc.allocate();
        assert_eq!(page.bytes()[7], 0);
        assert_eq!(alloc.stats().free, 0);
        assert_eq!(alloc.stats().to_string(), "pages allocated=1 free=0");
    }

    #[test]
    fn privatizing_a_shared_page_copies_it() {
        let alloc = PageAllocator::new();
        let mut a = alloc.allocate();
        Arc::make_mut(&mut a).bytes_mut()[0] = 1;
        Arc::make_mut(&mut a).set_aux(3);

        let mut b = Arc::clone(&a);
        assert_eq!(share_count(&a), 1);

        Arc::make_mut(&mut b).bytes_mut()[0] = 2;
        assert_eq!(a.bytes()[0], 1);
        assert_eq!(b.bytes()[0], 2);
        assert_eq!(b.aux(), 3);
        assert_eq!(share_count(&a), 0);
        assert_eq!(alloc.stats().allocated, 2);
    }
}
