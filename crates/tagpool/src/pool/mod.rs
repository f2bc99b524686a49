//! Variable-size memory pool with boundary-tag coalescing.
//!
//! The pool services arbitrary byte requests out of chunks acquired in bulk
//! from a [`ByteSource`]. Within a chunk, blocks carry intrusive boundary-tag
//! metadata; free blocks are threaded onto an explicit doubly-linked list
//! searched first-fit from the head. Deallocation coalesces eagerly in both
//! directions, so two free blocks are never physically adjacent.
//!
//! The pool is single-threaded: the caller serializes access if an instance
//! is shared (see `global` for a locked process-wide instance).

pub mod block;
pub mod chunk;
pub mod free_list;

use crate::diag;
use crate::source::{ByteSource, SystemSource};
use crate::{config, util};
use core::ptr;
use free_list::FreeList;

/// Counters produced by [`VariablePool::check_integrity`]. Walks every chunk
/// by size arithmetic and the free list by links; any violated invariant
/// bumps `errors`. Test tooling, not a hot path.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegrityReport {
    pub chunks: usize,
    pub blocks: usize,
    pub free_blocks: usize,
    pub free_list_len: usize,
    pub free_bytes: usize,
    pub errors: usize,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.errors == 0 && self.free_blocks == self.free_list_len
    }
}

pub struct VariablePool<Src: ByteSource = SystemSource> {
    chunk_head: *mut u8,
    free_list: FreeList,
    default_chunk_size: usize,
    source: Src,
}

// The pool exclusively owns every chunk it acquired; moving it to another
// thread moves that ownership wholesale. It is still !Sync: concurrent
// access needs an external lock.
unsafe impl<Src: ByteSource + Send> Send for VariablePool<Src> {}

impl VariablePool<SystemSource> {
    /// Empty pool over the process heap, chunk size from `TAGPOOL_CHUNK_SIZE`.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_source(SystemSource, config::default_chunk_size())
    }

    /// Empty pool over the process heap with an explicit default chunk size.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self::with_source(SystemSource, chunk_size)
    }
}

impl<Src: ByteSource> VariablePool<Src> {
    /// Empty pool over a caller-supplied byte source. `default_chunk_size`
    /// is rounded up to a power of two, floor [`util::MIN_CHUNK_SIZE`].
    pub fn with_source(source: Src, default_chunk_size: usize) -> Self {
        VariablePool {
            chunk_head: ptr::null_mut(),
            free_list: FreeList::new(),
            default_chunk_size: default_chunk_size
                .clamp(util::MIN_CHUNK_SIZE, 1 << 30)
                .next_power_of_two(),
            source,
        }
    }

    /// Allocate at least `size` bytes, aligned to [`util::MAX_ALIGN`].
    /// Returns null when `size == 0` or the byte source is exhausted.
    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        let want = match block::alloc_size(size) {
            Some(want) => want,
            None => return ptr::null_mut(),
        };
        unsafe {
            let mut found = self.free_list.find_first_fit(want);
            if found.is_null() {
                found = self.grow(want);
                if found.is_null() {
                    return ptr::null_mut();
                }
            }
            self.free_list.unlink(found);
            block::clear_flag(found, block::FREE);
            let fitted = self.fit(found, want);
            debug_assert!(fitted);
            let payload = block::payload(found);
            block::set_mask(found, payload as usize);
            payload
        }
    }

    /// Release the region at `ptr`. Null pointers and pointers failing the
    /// provenance check (including double frees) are ignored and counted by
    /// the diagnostic sink.
    ///
    /// # Safety
    /// `ptr` must be null, or a pointer for which the two words below it are
    /// readable -- any pointer previously returned by this pool qualifies,
    /// freed or live.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let blk = block::header_of(ptr);
        if block::mask(blk) != ptr as usize || block::is_free(blk) {
            diag::reject_pointer("tagpool: provenance check failed in deallocate\n");
            return;
        }
        self.release(blk);
    }

    /// Resize the region at `ptr` to at least `size` bytes.
    ///
    /// Null `ptr` acts as `allocate(size)`; `size == 0` deallocates and
    /// returns null. Growth is attempted in place (absorbing the following
    /// free block, then merging with the preceding one) before falling back
    /// to allocate-copy-release. On provenance failure or exhaustion the
    /// original region is left untouched and null is returned.
    ///
    /// # Safety
    /// Same contract as [`Self::deallocate`] for non-null `ptr`.
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.allocate(size);
        }
        let blk = block::header_of(ptr);
        if block::mask(blk) != ptr as usize || block::is_free(blk) {
            diag::reject_pointer("tagpool: provenance check failed in reallocate\n");
            return ptr::null_mut();
        }
        if size == 0 {
            self.release(blk);
            return ptr::null_mut();
        }
        let want = match block::alloc_size(size) {
            Some(want) => want,
            None => return ptr::null_mut(),
        };
        let old_payload = block::size(blk) - block::HEADER_SIZE;

        // Absorb the physically following free block. This serves both
        // in-place growth and the shrink path, which may split the absorbed
        // space right back off.
        if !block::is_last(blk) {
            let next = block::next_physical(blk);
            if block::is_free(next) {
                self.free_list.unlink(next);
                let merged = block::size(blk) + block::size(next);
                let flags =
                    (block::flags(blk) & block::PREV_FREE) | (block::flags(next) & block::LAST);
                block::set_tag(blk, merged, flags);
                if flags & block::LAST == 0 {
                    block::clear_flag(block::next_physical(blk), block::PREV_FREE);
                }
            }
        }
        if self.fit(blk, want) {
            // Payload address unchanged; the mask still matches.
            return ptr;
        }

        // Merge with the preceding free block, but only commit once the
        // merged extent is known to fit: failure must never move the payload.
        if block::is_prev_free(blk) {
            let pred = block::prev_physical(blk);
            let merged = block::size(pred) + block::size(blk);
            if merged >= want {
                self.free_list.unlink(pred);
                let flags =
                    (block::flags(pred) & block::PREV_FREE) | (block::flags(blk) & block::LAST);
                // The old header becomes payload interior; a stale pointer
                // into it must fail the mask check.
                block::set_mask(blk, 0);
                block::set_tag(pred, merged, flags);
                let new_payload = block::payload(pred);
                // Copy before fit() writes split metadata into the old extent.
                ptr::copy(ptr, new_payload, old_payload.min(size));
                let fitted = self.fit(pred, want);
                debug_assert!(fitted);
                block::set_mask(pred, new_payload as usize);
                return new_payload;
            }
        }

        // Relocate. Allocate first: on exhaustion the caller's block (even
        // if it absorbed a neighbor above) stays live and valid.
        let fresh = self.allocate(size);
        if fresh.is_null() {
            return ptr::null_mut();
        }
        ptr::copy_nonoverlapping(ptr, fresh, old_payload.min(size));
        self.release(blk);
        fresh
    }

    /// Trim `blk` (allocated, off the free list, `size >= want`) down to
    /// `want` bytes, splitting off the remainder as a free block when it can
    /// hold one. Returns false when the block is too small.
    unsafe fn fit(&mut self, blk: *mut u8, want: usize) -> bool {
        let total = block::size(blk);
        if total < want {
            return false;
        }
        let remainder = total - want;
        if remainder >= block::MIN_BLOCK_SIZE {
            let keep = block::flags(blk);
            let rest = blk.add(want);
            block::set_tag(rest, remainder, block::FREE | (keep & block::LAST));
            block::set_mask(rest, 0);
            block::install_footer(rest);
            self.free_list.push(rest);
            block::set_tag(blk, want, keep & block::PREV_FREE);
            if !block::is_last(rest) {
                block::set_flag(block::next_physical(rest), block::PREV_FREE);
            }
        } else if !block::is_last(blk) {
            // Consumed whole: the follower no longer has a free predecessor.
            block::clear_flag(block::next_physical(blk), block::PREV_FREE);
        }
        true
    }

    /// Free `blk`, coalescing with both physical neighbors.
    unsafe fn release(&mut self, blk: *mut u8) {
        // Invalidate the mask first: after a merge this header may end up in
        // the interior of a larger block, and a stale pointer to it must
        // fail the provenance check.
        block::set_mask(blk, 0);

        let mut base = blk;
        let mut total = block::size(blk);
        let mut flags = block::flags(blk);

        if flags & block::LAST == 0 {
            let next = block::next_physical(blk);
            if block::is_free(next) {
                self.free_list.unlink(next);
                total += block::size(next);
                flags = (flags & !block::LAST) | (block::flags(next) & block::LAST);
            }
        }
        if flags & block::PREV_FREE != 0 {
            let pred = block::prev_physical(blk);
            debug_assert!(block::is_free(pred));
            self.free_list.unlink(pred);
            total += block::size(pred);
            flags = (flags & !block::PREV_FREE) | (block::flags(pred) & block::PREV_FREE);
            base = pred;
        }

        block::set_tag(
            base,
            total,
            block::FREE | (flags & (block::PREV_FREE | block::LAST)),
        );
        block::set_mask(base, 0);
        block::install_footer(base);
        if flags & block::LAST == 0 {
            block::set_flag(block::next_physical(base), block::PREV_FREE);
        }
        self.free_list.push(base);
    }

    /// Acquire a fresh chunk big enough for a `want`-byte block and push its
    /// span onto the free list as one block. Returns that block, or null.
    unsafe fn grow(&mut self, want: usize) -> *mut u8 {
        let chunk_size = match chunk::size_for(want, self.default_chunk_size) {
            Some(size) => size,
            None => return ptr::null_mut(),
        };
        let base = self.source.acquire(chunk_size);
        if base.is_null() {
            return ptr::null_mut();
        }
        debug_assert!(util::is_aligned(base as usize, util::MAX_ALIGN));
        chunk::set_prev(base, self.chunk_head);
        chunk::set_len(base, chunk_size);
        chunk::install_footer(base);
        self.chunk_head = base;

        let first = chunk::first_block(base);
        block::set_tag(first, chunk_size - chunk::OVERHEAD, block::FREE | block::LAST);
        block::set_mask(first, 0);
        block::install_footer(first);
        self.free_list.push(first);
        first
    }

    /// Walk every chunk and the free list, verifying the boundary-tag
    /// invariants: granule-aligned sizes, no adjacent free blocks,
    /// `is_prev_free` consistency, footers pointing home, masks matching
    /// payloads, and blocks exactly tiling each chunk.
    pub fn check_integrity(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        unsafe {
            let mut c = self.chunk_head;
            while !c.is_null() {
                report.chunks += 1;
                if chunk::footer(c) != chunk::prev(c) {
                    // Sentinel footer must mirror the header's chunk link.
                    report.errors += 1;
                }
                let end = chunk::block_region_end(c) as usize;
                let mut b = chunk::first_block(c);
                let mut prev_was_free = false;
                let mut saw_last = false;
                while (b as usize) < end {
                    report.blocks += 1;
                    let size = block::size(b);
                    if size < block::MIN_BLOCK_SIZE || !util::is_aligned(size, block::GRANULE) {
                        report.errors += 1;
                        break;
                    }
                    if block::is_prev_free(b) != prev_was_free {
                        report.errors += 1;
                    }
                    if block::is_free(b) {
                        report.free_blocks += 1;
                        report.free_bytes += size;
                        if prev_was_free {
                            // Adjacent free blocks: coalescing missed.
                            report.errors += 1;
                        }
                        let footer = b.add(size).sub(block::FOOTER_SIZE) as *const usize;
                        if footer.read() != b as usize {
                            report.errors += 1;
                        }
                    } else if block::mask(b) != block::payload(b) as usize {
                        report.errors += 1;
                    }
                    prev_was_free = block::is_free(b);
                    if block::is_last(b) {
                        saw_last = true;
                        if b.add(size) as usize != end {
                            report.errors += 1;
                        }
                        break;
                    }
                    b = b.add(size);
                }
                if !saw_last {
                    report.errors += 1;
                }
                c = chunk::prev(c);
            }

            let mut node = self.free_list.head();
            while !node.is_null() {
                report.free_list_len += 1;
                if !block::is_free(node) {
                    report.errors += 1;
                }
                if report.free_list_len > report.blocks {
                    // Cycle or corruption; stop walking.
                    report.errors += 1;
                    break;
                }
                node = free_list::node_next(node);
            }
        }
        report
    }

    /// Number of chunks currently held from the byte source.
    pub fn chunk_count(&self) -> usize {
        let mut count = 0;
        let mut c = self.chunk_head;
        while !c.is_null() {
            count += 1;
            c = unsafe { chunk::prev(c) };
        }
        count
    }
}

impl<Src: ByteSource> Drop for VariablePool<Src> {
    fn drop(&mut self) {
        unsafe {
            let mut c = self.chunk_head;
            while !c.is_null() {
                let prev = chunk::prev(c);
                let len = chunk::len(c);
                self.source.release(c, len);
                c = prev;
            }
        }
        self.chunk_head = ptr::null_mut();
    }
}
