#![no_main]

use libfuzzer_sys::fuzz_target;
use tagpool::{FixedAllocator, VariablePool};

// Fuzz target that exercises size boundaries: interprets input as a series
// of u32 sizes, allocates each, writes the full extent, verifies alignment
// and readback, reallocates to the next size, and frees.

fuzz_target!(|data: &[u8]| {
    let mut pool = VariablePool::with_chunk_size(4096);
    let mut fixed = FixedAllocator::<64>::with_slots_per_chunk(16);

    let mut i = 0;
    while i + 4 <= data.len() {
        let raw_size = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        i += 4;

        // Cap size to prevent OOM
        let size = (raw_size as usize) % (256 * 1024); // Max 256 KiB

        let ptr = pool.allocate(size);
        if size == 0 {
            assert!(ptr.is_null(), "allocate(0) must return null");
            continue;
        }
        assert!(!ptr.is_null());
        assert_eq!(
            (ptr as usize) % 16,
            0,
            "allocate({}) returned unaligned pointer {:p}",
            size,
            ptr
        );

        // Write to full extent -- this should not crash
        unsafe {
            std::ptr::write_bytes(ptr, 0xBB, size);
        }
        for j in (0..size).step_by(97) {
            assert_eq!(unsafe { *ptr.add(j) }, 0xBB);
        }

        // Double the size in place or by relocation; the prefix survives.
        let grown = unsafe { pool.reallocate(ptr, size * 2) };
        assert!(!grown.is_null());
        for j in (0..size).step_by(97) {
            assert_eq!(unsafe { *grown.add(j) }, 0xBB, "realloc lost byte {}", j);
        }
        unsafe { pool.deallocate(grown) };

        // One fixed-slot cycle per input size keeps both engines in play.
        let slot = fixed.allocate();
        assert!(!slot.is_null());
        unsafe {
            std::ptr::write_bytes(slot, 0xCC, 64);
            fixed.deallocate(slot);
        }
    }

    let report = pool.check_integrity();
    assert!(report.is_consistent(), "integrity violated: {:?}", report);
});
