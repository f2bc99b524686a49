//! Random-lifetime churn: a window of live allocations is repeatedly
//! replaced at random indices with random sizes, the pattern that defeats
//! simple bump allocators and exercises split/coalesce paths.

use std::hint::black_box;
use std::time::Instant;
use tagpool::VariablePool;

const WINDOW: usize = 1024;
const MIN_SIZE: usize = 8;
const MAX_SIZE: usize = 2048;

/// xorshift64* -- cheap deterministic sizes and indices.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut s = self.0;
        s ^= s >> 12;
        s ^= s << 25;
        s ^= s >> 27;
        self.0 = s;
        s.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

fn main() {
    let ops = 2_000_000usize;
    let mut rng = Rng(0x9E3779B97F4A7C15);
    let mut pool = VariablePool::new();
    let mut slots: Vec<(*mut u8, usize)> = vec![(std::ptr::null_mut(), 0); WINDOW];

    // Fill the window before timing.
    for slot in slots.iter_mut() {
        let size = MIN_SIZE + rng.next() as usize % (MAX_SIZE - MIN_SIZE);
        let ptr = pool.allocate(size);
        assert!(!ptr.is_null());
        unsafe { std::ptr::write_bytes(ptr, 0x5A, size.min(64)) };
        *slot = (ptr, size);
    }

    let start = Instant::now();
    for _ in 0..ops {
        let index = rng.next() as usize % WINDOW;
        let size = MIN_SIZE + rng.next() as usize % (MAX_SIZE - MIN_SIZE);
        let (old, _) = slots[index];
        unsafe {
            pool.deallocate(black_box(old));
            let ptr = pool.allocate(black_box(size));
            assert!(!ptr.is_null());
            std::ptr::write_bytes(ptr, 0x5A, size.min(64));
            slots[index] = (ptr, size);
        }
    }
    let elapsed = start.elapsed();

    let report = pool.check_integrity();
    assert!(report.is_consistent(), "churn corrupted the pool: {:?}", report);

    println!(
        "churn: {} replace ops over a {}-slot window in {:.2?} ({:.1} ns/op, {} chunks held)",
        ops,
        WINDOW,
        elapsed,
        elapsed.as_nanos() as f64 / ops as f64,
        report.chunks,
    );
}
