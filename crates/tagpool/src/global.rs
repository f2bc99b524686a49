//! Process-wide variable pool.
//!
//! The engines themselves are single-threaded; this module serializes one
//! lazily-constructed [`VariablePool`] behind a mutex for callers that want
//! a singleton access pattern. Prefer constructing your own pool instance
//! where you can scope its lifetime.

use crate::pool::VariablePool;
use std::sync::{Mutex, PoisonError};

static POOL: Mutex<Option<VariablePool>> = Mutex::new(None);

/// Run `f` against the process-wide pool, constructing it on first use.
///
/// A poisoned lock is recovered rather than propagated: the pool's chunk
/// and free-list state is only mutated through these entry points, so a
/// panic in `f` cannot leave it half-updated.
pub fn with_pool<R>(f: impl FnOnce(&mut VariablePool) -> R) -> R {
    let mut guard = POOL.lock().unwrap_or_else(PoisonError::into_inner);
    f(guard.get_or_insert_with(VariablePool::new))
}

/// [`VariablePool::allocate`] on the process-wide pool.
pub fn allocate(size: usize) -> *mut u8 {
    with_pool(|pool| pool.allocate(size))
}

/// [`VariablePool::reallocate`] on the process-wide pool.
///
/// # Safety
/// `ptr` must be null or a pointer obtained from this module's `allocate`/
/// `reallocate`.
pub unsafe fn reallocate(ptr: *mut u8, size: usize) -> *mut u8 {
    with_pool(|pool| unsafe { pool.reallocate(ptr, size) })
}

/// [`VariablePool::deallocate`] on the process-wide pool.
///
/// # Safety
/// `ptr` must be null or a pointer obtained from this module's `allocate`/
/// `reallocate`.
pub unsafe fn deallocate(ptr: *mut u8) {
    with_pool(|pool| unsafe { pool.deallocate(ptr) })
}
