//! Microbenchmarks for tagpool: pool allocate/deallocate latency across
//! sizes, reallocation growth chains, and fixed-slot recycling.

use std::hint::black_box;
use std::time::Instant;
use tagpool::{FixedAllocator, VariablePool};

/// Measure pool allocate/deallocate latency for a given size, N iterations.
fn bench_pool_alloc_free(size: usize, iterations: usize) -> f64 {
    let mut pool = VariablePool::new();
    // Warmup
    for _ in 0..1000 {
        unsafe {
            let ptr = pool.allocate(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, std::cmp::min(size, 64));
            pool.deallocate(black_box(ptr));
        }
    }
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = pool.allocate(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, std::cmp::min(size, 64));
            pool.deallocate(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Measure a growing reallocation chain.
fn bench_pool_realloc_grow(iterations: usize) -> f64 {
    let mut pool = VariablePool::new();
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let mut ptr = pool.allocate(black_box(16));
            for &size in black_box(&[32usize, 64, 128, 256, 512, 1024]) {
                ptr = pool.reallocate(black_box(ptr), size);
            }
            pool.deallocate(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Measure fixed-allocator slot recycling.
fn bench_fixed_cycle(iterations: usize) -> f64 {
    let mut alloc = FixedAllocator::<64>::new();
    for _ in 0..1000 {
        unsafe {
            let ptr = alloc.allocate();
            std::ptr::write_bytes(ptr, 0xAB, 64);
            alloc.deallocate(black_box(ptr));
        }
    }
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = alloc.allocate();
            std::ptr::write_bytes(ptr, 0xAB, 64);
            alloc.deallocate(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

fn main() {
    let iterations = 1_000_000;

    println!("tagpool microbenchmarks ({} iterations)", iterations);
    println!();
    println!("pool allocate/deallocate:");
    for &size in &[16usize, 64, 256, 1024, 4096, 16384] {
        let ns = bench_pool_alloc_free(size, iterations);
        println!("  {:>6} B  {:>8.1} ns/op", size, ns);
    }
    println!();
    println!(
        "pool realloc 16 -> 1024:  {:>8.1} ns/chain",
        bench_pool_realloc_grow(iterations / 10)
    );
    println!(
        "fixed 64 B cycle:         {:>8.1} ns/op",
        bench_fixed_cycle(iterations)
    );
}
