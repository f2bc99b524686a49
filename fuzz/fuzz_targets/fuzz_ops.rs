#![no_main]

use libfuzzer_sys::fuzz_target;
use tagpool::VariablePool;

/// Fuzz target that interprets a byte slice as a sequence of pool operations.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=allocate, 1=deallocate, 2=reallocate, 3=integrity)
///   byte 1-2: size (little-endian u16, capped)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// Every live region is filled with its slot's byte; deallocate and
/// reallocate verify the fill first, so any cross-region clobbering or
/// payload loss trips an assert.
const MAX_SLOTS: usize = 32;
const MAX_SIZE: usize = 4096;

fn fill(ptr: *mut u8, size: usize, byte: u8) {
    unsafe { std::ptr::write_bytes(ptr, byte, size) };
}

fn verify(ptr: *mut u8, size: usize, byte: u8) {
    let slice = unsafe { std::slice::from_raw_parts(ptr, size) };
    assert!(
        slice.iter().all(|&b| b == byte),
        "live region lost its fill byte"
    );
}

fuzz_target!(|data: &[u8]| {
    let mut pool = VariablePool::with_chunk_size(4096);
    let mut slots: [(*mut u8, usize); MAX_SLOTS] = [(std::ptr::null_mut(), 0); MAX_SLOTS];

    let mut i = 0;
    while i + 4 <= data.len() {
        let opcode = data[i] & 0x03;
        let size = (u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize) % (MAX_SIZE + 1);
        let slot = (data[i + 3] as usize) % MAX_SLOTS;
        i += 4;

        match opcode {
            0 => {
                let (old, old_size) = slots[slot];
                if !old.is_null() {
                    verify(old, old_size, slot as u8);
                    unsafe { pool.deallocate(old) };
                }
                let ptr = pool.allocate(size);
                assert_eq!(ptr.is_null(), size == 0);
                if !ptr.is_null() {
                    assert_eq!(ptr as usize % 16, 0, "allocate({}) misaligned", size);
                    fill(ptr, size, slot as u8);
                }
                slots[slot] = (ptr, size);
            }
            1 => {
                let (old, old_size) = slots[slot];
                if !old.is_null() {
                    verify(old, old_size, slot as u8);
                    unsafe { pool.deallocate(old) };
                    slots[slot] = (std::ptr::null_mut(), 0);
                }
            }
            2 => {
                let (old, old_size) = slots[slot];
                if !old.is_null() {
                    verify(old, old_size, slot as u8);
                }
                let ptr = unsafe { pool.reallocate(old, size) };
                if size == 0 {
                    assert!(ptr.is_null());
                    slots[slot] = (std::ptr::null_mut(), 0);
                } else {
                    assert!(!ptr.is_null());
                    if !old.is_null() {
                        verify(ptr, old_size.min(size), slot as u8);
                    }
                    fill(ptr, size, slot as u8);
                    slots[slot] = (ptr, size);
                }
            }
            3 => {
                let report = pool.check_integrity();
                assert!(report.is_consistent(), "integrity violated: {:?}", report);
            }
            _ => unreachable!(),
        }
    }

    // Final sweep: free everything and require full coalescing per chunk.
    for (index, (ptr, size)) in slots.iter().enumerate() {
        if !ptr.is_null() {
            verify(*ptr, *size, index as u8);
            unsafe { pool.deallocate(*ptr) };
        }
    }
    let report = pool.check_integrity();
    assert!(report.is_consistent(), "integrity violated: {:?}", report);
    assert_eq!(
        report.blocks, report.chunks,
        "an empty pool must hold one spanning free block per chunk"
    );
});
