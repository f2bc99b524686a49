//! Behavior tests for the fixed-size allocator.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use tagpool::{ByteSource, FixedAllocator, SystemSource};

/// Byte source that tracks outstanding bytes, for teardown accounting.
#[derive(Clone)]
struct CountingSource {
    outstanding: Rc<Cell<usize>>,
    inner: SystemSource,
}

impl CountingSource {
    fn new() -> (Self, Rc<Cell<usize>>) {
        let outstanding = Rc::new(Cell::new(0));
        (
            CountingSource {
                outstanding: outstanding.clone(),
                inner: SystemSource,
            },
            outstanding,
        )
    }
}

impl ByteSource for CountingSource {
    fn acquire(&mut self, size: usize) -> *mut u8 {
        let ptr = self.inner.acquire(size);
        if !ptr.is_null() {
            self.outstanding.set(self.outstanding.get() + size);
        }
        ptr
    }

    unsafe fn release(&mut self, ptr: *mut u8, size: usize) {
        self.outstanding.set(self.outstanding.get() - size);
        self.inner.release(ptr, size);
    }
}

/// Byte source that always fails, to exercise exhaustion propagation.
struct FailingSource;

impl ByteSource for FailingSource {
    fn acquire(&mut self, _size: usize) -> *mut u8 {
        std::ptr::null_mut()
    }

    unsafe fn release(&mut self, _ptr: *mut u8, _size: usize) {
        unreachable!("nothing was ever acquired");
    }
}

// ---------------------------------------------------------------------------
// Five allocations with 4 slots per chunk span two chunks; freed slots are
// reused LIFO
// ---------------------------------------------------------------------------

#[test]
fn five_allocations_span_two_chunks() {
    let mut alloc = FixedAllocator::<64>::with_slots_per_chunk(4);

    let ptrs: Vec<*mut u8> = (0..5).map(|_| alloc.allocate()).collect();
    assert!(ptrs.iter().all(|p| !p.is_null()));

    let unique: HashSet<usize> = ptrs.iter().map(|p| *p as usize).collect();
    assert_eq!(unique.len(), 5, "allocations must be distinct");
    assert_eq!(alloc.chunk_count(), 2);

    unsafe { alloc.deallocate(ptrs[2]) };
    let reused = alloc.allocate();
    assert_eq!(reused, ptrs[2], "freed slot must be recycled first");
}

// ---------------------------------------------------------------------------
// Caller writes fill the whole payload without disturbing the allocator
// ---------------------------------------------------------------------------

#[test]
fn full_payload_writes_are_safe() {
    let mut alloc = FixedAllocator::<64>::with_slots_per_chunk(8);

    let p = alloc.allocate();
    assert!(!p.is_null());
    unsafe {
        std::ptr::write_bytes(p, 0xEF, 64);
        alloc.deallocate(p);
    }

    // The slot is reusable and a fresh allocation still works.
    let q = alloc.allocate();
    assert_eq!(q, p);
    let r = alloc.allocate();
    assert!(!r.is_null());
    assert_ne!(r, q);
}

// ---------------------------------------------------------------------------
// Live payloads do not overlap
// ---------------------------------------------------------------------------

#[test]
fn live_payloads_are_independent() {
    let mut alloc = FixedAllocator::<16>::with_slots_per_chunk(4);

    let ptrs: Vec<*mut u8> = (0..32).map(|_| alloc.allocate()).collect();
    for (i, &p) in ptrs.iter().enumerate() {
        unsafe { std::ptr::write_bytes(p, i as u8, 16) };
    }
    for (i, &p) in ptrs.iter().enumerate() {
        let slice = unsafe { std::slice::from_raw_parts(p, 16) };
        assert!(
            slice.iter().all(|&b| b == i as u8),
            "payload {} was clobbered",
            i
        );
    }
    for &p in &ptrs {
        unsafe { alloc.deallocate(p) };
    }
    assert_eq!(alloc.free_slot_count(), alloc.chunk_count() * 4);
}

// ---------------------------------------------------------------------------
// Returned pointers are word-aligned
// ---------------------------------------------------------------------------

#[test]
fn pointers_are_word_aligned() {
    let word = std::mem::size_of::<usize>();

    let mut small = FixedAllocator::<3>::with_slots_per_chunk(8);
    let mut odd = FixedAllocator::<17>::with_slots_per_chunk(8);
    for _ in 0..16 {
        assert_eq!(small.allocate() as usize % word, 0);
        assert_eq!(odd.allocate() as usize % word, 0);
    }
}

// ---------------------------------------------------------------------------
// Chunk acquisition amortizes: many allocations, exact chunk count
// ---------------------------------------------------------------------------

#[test]
fn chunk_growth_is_demand_driven() {
    let mut alloc = FixedAllocator::<32>::with_slots_per_chunk(16);
    assert_eq!(alloc.chunk_count(), 0);

    let ptrs: Vec<*mut u8> = (0..1000).map(|_| alloc.allocate()).collect();
    assert_eq!(alloc.chunk_count(), 1000_usize.div_ceil(16));

    for &p in &ptrs {
        unsafe { alloc.deallocate(p) };
    }
    // Chunks are retained for reuse, never returned early.
    assert_eq!(alloc.chunk_count(), 1000_usize.div_ceil(16));
    assert_eq!(alloc.free_slot_count(), alloc.chunk_count() * 16);
}

// ---------------------------------------------------------------------------
// Exhausted byte source surfaces as a null return
// ---------------------------------------------------------------------------

#[test]
fn source_exhaustion_returns_null() {
    let mut alloc = FixedAllocator::<64, FailingSource>::with_source(FailingSource, 8);
    assert!(alloc.allocate().is_null());
    // The allocator stays usable as a (permanently empty) instance.
    assert!(alloc.allocate().is_null());
    assert_eq!(alloc.chunk_count(), 0);
}

// ---------------------------------------------------------------------------
// Drop releases every byte back to the source
// ---------------------------------------------------------------------------

#[test]
fn drop_releases_all_chunks() {
    let (source, outstanding) = CountingSource::new();
    {
        let mut alloc = FixedAllocator::<48, CountingSource>::with_source(source, 8);
        let ptrs: Vec<*mut u8> = (0..40).map(|_| alloc.allocate()).collect();
        assert!(outstanding.get() > 0);
        // Leave half of them live: teardown must not depend on the caller
        // freeing everything.
        for &p in ptrs.iter().step_by(2) {
            unsafe { alloc.deallocate(p) };
        }
    }
    assert_eq!(outstanding.get(), 0, "teardown leaked chunk bytes");
}
