//! Diagnostic sink for pointer-provenance failures.
//!
//! Provenance mismatches are caller errors, not allocator failures: the
//! offending call becomes a no-op (or a null return), a process-wide counter
//! is bumped, and -- when `TAGPOOL_DIAG` is set -- one line goes to stderr.
//! The allocators never abort on caller error.

use crate::config;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::io::Write;

static REJECTED: AtomicUsize = AtomicUsize::new(0);

/// Number of provenance-rejected pointers since process start.
pub fn rejected_pointer_count() -> usize {
    REJECTED.load(Ordering::Relaxed)
}

#[cold]
#[inline(never)]
pub(crate) fn reject_pointer(msg: &str) {
    REJECTED.fetch_add(1, Ordering::Relaxed);
    if config::diag_enabled() {
        let _ = std::io::stderr().write_all(msg.as_bytes());
    }
}
