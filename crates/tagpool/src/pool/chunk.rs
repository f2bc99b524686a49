//! Chunk layout for the variable pool.
//!
//! A chunk is one contiguous acquisition from the byte source. Its first
//! granule is the chunk header ([prev chunk][byte length]); its last granule
//! is a sentinel footer repeating the previous-chunk pointer. Blocks fill
//! everything in between. Chunks form a singly-linked stack in acquisition
//! order and are only released when the pool is dropped.

use super::block::{GRANULE, MIN_BLOCK_SIZE};
use crate::util::WORD;

pub const CHUNK_HEADER_SIZE: usize = GRANULE;
pub const CHUNK_FOOTER_SIZE: usize = GRANULE;
pub const OVERHEAD: usize = CHUNK_HEADER_SIZE + CHUNK_FOOTER_SIZE;

const _: () = assert!(CHUNK_HEADER_SIZE >= 2 * WORD);
const _: () = assert!(CHUNK_FOOTER_SIZE >= WORD);

#[inline(always)]
pub unsafe fn prev(chunk: *mut u8) -> *mut u8 {
    (chunk as *const *mut u8).read()
}

#[inline(always)]
pub unsafe fn set_prev(chunk: *mut u8, value: *mut u8) {
    (chunk as *mut *mut u8).write(value);
}

#[inline(always)]
pub unsafe fn len(chunk: *mut u8) -> usize {
    (chunk as *const usize).add(1).read()
}

#[inline(always)]
pub unsafe fn set_len(chunk: *mut u8, value: usize) {
    (chunk as *mut usize).add(1).write(value);
}

/// Sentinel footer at the chunk's high end: a copy of the previous-chunk
/// pointer, written once at carve time.
#[inline(always)]
pub unsafe fn install_footer(chunk: *mut u8) {
    let footer = chunk.add(len(chunk) - CHUNK_FOOTER_SIZE);
    (footer as *mut *mut u8).write(prev(chunk));
}

/// Read the sentinel footer back.
#[inline(always)]
pub unsafe fn footer(chunk: *mut u8) -> *mut u8 {
    let footer = chunk.add(len(chunk) - CHUNK_FOOTER_SIZE);
    (footer as *const *mut u8).read()
}

#[inline(always)]
pub unsafe fn first_block(chunk: *mut u8) -> *mut u8 {
    chunk.add(CHUNK_HEADER_SIZE)
}

/// One past the last block byte: where the sentinel footer begins.
#[inline(always)]
pub unsafe fn block_region_end(chunk: *mut u8) -> *mut u8 {
    chunk.add(len(chunk) - CHUNK_FOOTER_SIZE)
}

/// Chunk size for a block of `alloc_size` bytes: the default size when it
/// fits, otherwise the next power of two that holds the block plus chunk
/// overhead and one minimum trailing block. None on overflow.
pub fn size_for(alloc_size: usize, default_size: usize) -> Option<usize> {
    let needed = OVERHEAD
        .checked_add(alloc_size)?
        .checked_add(MIN_BLOCK_SIZE)?;
    if needed <= default_size {
        Some(default_size)
    } else {
        needed.checked_next_power_of_two()
    }
}
