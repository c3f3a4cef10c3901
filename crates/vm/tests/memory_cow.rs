use vm::memory::{PAGE_SIZE, STACK_TOP};
use vm::{AddressSpace, PageAllocator};

const HEAP: u32 = 0x0050_0000;

#[test]
fn forked_spaces_stay_isolated() {
    let allocator = PageAllocator::new();
    let mut p0 = AddressSpace::new(allocator.clone());
    p0.alloc(HEAP, 2 * PAGE_SIZE).unwrap();
    p0.store_word(HEAP, 0x1111_1111).unwrap();
    p0.store_word(HEAP + PAGE_SIZE, 0xaaaa_aaaa).unwrap();

    let mut p1 = p0.fork();
    assert_eq!(p0.share_count(HEAP), Some(1));
    p1.store_word(HEAP, 0x2222_2222).unwrap();
    let mut p2 = p1.fork();
    p2.store_word(HEAP, 0x3333_3333).unwrap();
    p2.store_word(HEAP + PAGE_SIZE, 0xbbbb_bbbb).unwrap();

    assert_eq!(p0.load_word(HEAP).unwrap(), 0x1111_1111);
    assert_eq!(p1.load_word(HEAP).unwrap(), 0x2222_2222);
    assert_eq!(p2.load_word(HEAP).unwrap(), 0x3333_3333);
    assert_eq!(p0.load_word(HEAP + PAGE_SIZE).unwrap(), 0xaaaa_aaaa);
    assert_eq!(p1.load_word(HEAP + PAGE_SIZE).unwrap(), 0xaaaa_aaaa);
    assert_eq!(p2.load_word(HEAP + PAGE_SIZE).unwrap(), 0xbbbb_bbbb);

    // second page still shared by p0 and p1
    assert_eq!(p0.share_count(HEAP + PAGE_SIZE), Some(1));
    assert_eq!(p1.share_count(HEAP), Some(0));
    assert_eq!(allocator.stats().allocated, 5);

    drop(p2);
    drop(p1);
    assert_eq!(allocator.stats().allocated, 2);
    assert_eq!(allocator.stats().free, 3);
}

#[test]
fn exited_space_returns_pages_to_pool() {
    let allocator = PageAllocator::new();
    let mut space = AddressSpace::new(allocator.clone());
    let base = space.alloc(0, 3 * PAGE_SIZE).unwrap();
    assert!(base >= STACK_TOP);
    space.clear();
    assert_eq!(space.mapped_pages(), 0);

    let stats = allocator.stats();
    assert_eq!(stats.allocated, 0);
    assert_eq!(stats.free, 3);
    assert_eq!(stats.to_string(), "pages allocated=0 free=3");
}
