//! Fixed-size object allocator.
//!
//! `FixedAllocator<S>` recycles S-byte slots drawn from chunks of
//! `slots_per_chunk` slots each. Free slots are threaded into an intrusive
//! singly-linked list through their meta word; allocation pops the head and
//! deallocation pushes, so both are O(1) outside of chunk acquisition.
//!
//! Slot layout: one meta word followed by the payload. While a slot is free
//! the meta word links to the next free slot; while allocated it holds the
//! provenance mask -- the payload's own address -- which deallocation
//! validates before accepting a pointer. Keeping the meta word outside the
//! payload means caller writes cannot erase the mask.

use crate::config;
use crate::diag;
use crate::source::{ByteSource, SystemSource};
use crate::util::{align_up, WORD};
use core::ptr;

pub struct FixedAllocator<const S: usize, Src: ByteSource = SystemSource> {
    chunk_head: *mut u8,
    free_head: *mut u8,
    slots_per_chunk: usize,
    source: Src,
}

impl<const S: usize> FixedAllocator<S, SystemSource> {
    /// Empty allocator over the process heap, slot count per chunk from
    /// `TAGPOOL_SLOTS_PER_CHUNK`.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_source(SystemSource, config::default_slots_per_chunk())
    }

    /// Empty allocator over the process heap with an explicit chunk shape.
    pub fn with_slots_per_chunk(slots_per_chunk: usize) -> Self {
        Self::with_source(SystemSource, slots_per_chunk)
    }
}

impl<const S: usize, Src: ByteSource> FixedAllocator<S, Src> {
    /// Payload bytes per slot: the requested size, word-rounded, at least
    /// one word.
    pub const PAYLOAD_SIZE: usize = align_up(if S == 0 { 1 } else { S }, WORD);

    const SLOT_SIZE: usize = WORD + Self::PAYLOAD_SIZE;

    pub fn with_source(source: Src, slots_per_chunk: usize) -> Self {
        assert!(slots_per_chunk > 0, "slots_per_chunk must be non-zero");
        FixedAllocator {
            chunk_head: ptr::null_mut(),
            free_head: ptr::null_mut(),
            slots_per_chunk,
            source,
        }
    }

    /// Allocate one S-byte region, aligned to at least the pointer width.
    /// Returns null only when the byte source cannot supply a new chunk.
    pub fn allocate(&mut self) -> *mut u8 {
        if self.free_head.is_null() && !self.grow() {
            return ptr::null_mut();
        }
        unsafe {
            let slot = self.free_head;
            self.free_head = (slot as *const *mut u8).read();
            let payload = slot.add(WORD);
            // Install the provenance mask over the free-list link.
            (slot as *mut usize).write(payload as usize);
            payload
        }
    }

    /// Return `ptr` to the free list. Null pointers and pointers failing the
    /// provenance check (including double frees: the meta word of a free
    /// slot holds a list link, never the payload address) are ignored and
    /// counted by the diagnostic sink.
    ///
    /// # Safety
    /// `ptr` must be null, or a pointer for which the word below it is
    /// readable -- any pointer previously returned by this allocator
    /// qualifies, freed or live.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let slot = ptr.sub(WORD);
        if (slot as *const usize).read() != ptr as usize {
            diag::reject_pointer("tagpool: provenance check failed in fixed deallocate\n");
            return;
        }
        (slot as *mut *mut u8).write(self.free_head);
        self.free_head = slot;
    }

    /// Acquire one chunk and thread its slots into the free list.
    fn grow(&mut self) -> bool {
        let chunk = self.source.acquire(self.chunk_bytes());
        if chunk.is_null() {
            return false;
        }
        unsafe {
            (chunk as *mut *mut u8).write(self.chunk_head);
            self.chunk_head = chunk;

            let first = chunk.add(WORD);
            for i in 0..self.slots_per_chunk {
                let slot = first.add(i * Self::SLOT_SIZE);
                let next = if i + 1 == self.slots_per_chunk {
                    ptr::null_mut()
                } else {
                    slot.add(Self::SLOT_SIZE)
                };
                (slot as *mut *mut u8).write(next);
            }
            self.free_head = first;
        }
        true
    }

    fn chunk_bytes(&self) -> usize {
        WORD + self.slots_per_chunk * Self::SLOT_SIZE
    }

    pub fn slots_per_chunk(&self) -> usize {
        self.slots_per_chunk
    }

    /// Number of chunks currently held from the byte source.
    pub fn chunk_count(&self) -> usize {
        let mut count = 0;
        let mut c = self.chunk_head;
        while !c.is_null() {
            count += 1;
            c = unsafe { (c as *const *mut u8).read() };
        }
        count
    }

    /// Length of the free list. O(n); test tooling.
    pub fn free_slot_count(&self) -> usize {
        let mut count = 0;
        let mut s = self.free_head;
        while !s.is_null() {
            count += 1;
            s = unsafe { (s as *const *mut u8).read() };
        }
        count
    }
}

impl<const S: usize, Src: ByteSource> Drop for FixedAllocator<S, Src> {
    fn drop(&mut self) {
        let bytes = self.chunk_bytes();
        unsafe {
            let mut c = self.chunk_head;
            while !c.is_null() {
                let prev = (c as *const *mut u8).read();
                self.source.release(c, bytes);
                c = prev;
            }
        }
        self.chunk_head = ptr::null_mut();
        self.free_head = ptr::null_mut();
    }
}
