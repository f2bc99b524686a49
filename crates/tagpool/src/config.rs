use crate::util::{DEFAULT_CHUNK_SIZE, DEFAULT_SLOTS_PER_CHUNK, MIN_CHUNK_SIZE};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Cached config values, read from the environment on first use.
/// 0 means "not read yet"; every real value is non-zero.
static CHUNK_SIZE: AtomicUsize = AtomicUsize::new(0);
static SLOTS_PER_CHUNK: AtomicUsize = AtomicUsize::new(0);

/// Diag flag: 0 = not read, 1 = off, 2 = on.
static DIAG: AtomicUsize = AtomicUsize::new(0);

/// Default chunk size for `VariablePool::new`.
/// `TAGPOOL_CHUNK_SIZE`, rounded up to a power of two, floor 1 KiB.
pub fn default_chunk_size() -> usize {
    cached(&CHUNK_SIZE, || {
        env_usize("TAGPOOL_CHUNK_SIZE")
            .unwrap_or(DEFAULT_CHUNK_SIZE)
            .clamp(MIN_CHUNK_SIZE, 1 << 30)
            .next_power_of_two()
    })
}

/// Default slots per chunk for `FixedAllocator::new`.
/// `TAGPOOL_SLOTS_PER_CHUNK`, clamped to [4, 65536].
pub fn default_slots_per_chunk() -> usize {
    cached(&SLOTS_PER_CHUNK, || {
        env_usize("TAGPOOL_SLOTS_PER_CHUNK")
            .unwrap_or(DEFAULT_SLOTS_PER_CHUNK)
            .clamp(4, 65536)
    })
}

/// Whether provenance failures are reported to stderr (`TAGPOOL_DIAG`).
pub fn diag_enabled() -> bool {
    match DIAG.load(Ordering::Relaxed) {
        0 => {
            let on = std::env::var_os("TAGPOOL_DIAG").is_some_and(|v| !v.is_empty());
            DIAG.store(if on { 2 } else { 1 }, Ordering::Relaxed);
            on
        }
        v => v == 2,
    }
}

/// Read-once helper. A benign race may read the environment twice; both
/// reads store the same value.
fn cached(slot: &AtomicUsize, read: impl FnOnce() -> usize) -> usize {
    match slot.load(Ordering::Relaxed) {
        0 => {
            let value = read().max(1);
            slot.store(value, Ordering::Relaxed);
            value
        }
        value => value,
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}
