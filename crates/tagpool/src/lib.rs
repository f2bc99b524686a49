//! Chunked memory-management primitives for allocation-heavy workloads:
//! a fixed-size object allocator and a variable-size boundary-tag pool.
//!
//! Both engines acquire storage in chunks from a [`ByteSource`], embed their
//! metadata inside the allocations themselves, and validate caller-supplied
//! pointers with a provenance mask before touching them. Chunks are retained
//! until the owning allocator is dropped; neither engine is thread-safe on
//! its own (the `global` module wraps one pool in a lock for singleton use).
//!
//! ```
//! use tagpool::{FixedAllocator, VariablePool};
//!
//! let mut pool = VariablePool::new();
//! let p = pool.allocate(100);
//! assert!(!p.is_null());
//! let p = unsafe { pool.reallocate(p, 200) };
//! unsafe { pool.deallocate(p) };
//!
//! let mut nodes = FixedAllocator::<64>::new();
//! let q = nodes.allocate();
//! unsafe { nodes.deallocate(q) };
//! ```

pub mod config;
pub mod diag;
pub mod fixed;
pub mod global;
#[cfg(unix)]
pub mod platform;
pub mod pool;
pub mod source;
pub mod util;

pub use fixed::FixedAllocator;
pub use pool::{IntegrityReport, VariablePool};
#[cfg(unix)]
pub use source::PageSource;
pub use source::{ByteSource, SystemSource};
