//! Round-robin fixed pool: the contrasting low-overhead policy.
//!
//! A fixed set of pre-constructed resources sharing one identity, handed
//! out in strict rotation by an atomic counter. `next()` is O(1), never
//! blocks, never fails, and applies no backpressure.
//!
//! # Shared-use hazard
//!
//! There is no acquire/release pairing: the same resource may be handed to
//! a new caller while a previous caller is still using it. This is only
//! safe when the operation performed is concurrent-read-only (for example
//! rendering from an immutable, fully pre-loaded style with no per-request
//! mutable fields). If a caller must mutate the resource before use, such
//! as setting a per-request viewport, overlapping callers can observe each
//! other's writes. Prefer [`KeyedPool`](crate::KeyedPool) whenever the
//! resource carries per-request state; this policy exists for workloads
//! that accept the trade-off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed-size pool reused via index rotation.
pub struct RoundRobinPool<R> {
    resources: Vec<Arc<R>>,
    cursor: AtomicUsize,
}

impl<R> RoundRobinPool<R> {
    /// Build the pool from a fixed, non-empty list of resources.
    ///
    /// # Panics
    ///
    /// Panics if `resources` is empty.
    pub fn new(resources: Vec<R>) -> Self {
        assert!(!resources.is_empty(), "round-robin pool requires at least one resource");
        Self {
            resources: resources.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Hand out the next resource in rotation.
    ///
    /// The returned handle is shared, not exclusive; see the module docs.
    pub fn next(&self) -> Arc<R> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.resources.len();
        Arc::clone(&self.resources[index])
    }

    /// Number of resources in the rotation.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
