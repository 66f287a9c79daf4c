//! Linear-probe document id allocation.
//!
//! New entities get human-readable ids of the form `"<basename>-<n>"`, where
//! `basename` is the entity's type tag and `n` is the smallest non-negative
//! integer whose token does not already exist in the store. This is a probe,
//! not a counter: no central sequence is assumed to exist.
//!
//! Uniqueness holds only at the instant of the existence check. Two
//! allocators racing on the same basename can hand out the same id; callers
//! needing strict safety must serialize allocation externally. This window
//! is a documented property of the scheme, not something this module hides.

use std::sync::Arc;

use tracing::debug;

use arena_store::DocStore;
use arena_types::DocId;

use crate::error::{MapperError, MapperResult};

/// Probe ceiling guarding against an unbounded loop on a store that claims
/// every id exists.
pub const DEFAULT_PROBE_LIMIT: u64 = 1 << 20;

/// Allocates collision-free document ids by probing the store.
pub struct IdAllocator {
    store: Arc<dyn DocStore>,
    probe_limit: u64,
}

impl IdAllocator {
    /// Create an allocator with the default probe ceiling.
    pub fn new(store: Arc<dyn DocStore>) -> Self {
        Self::with_probe_limit(store, DEFAULT_PROBE_LIMIT)
    }

    /// Create an allocator with a custom probe ceiling.
    pub fn with_probe_limit(store: Arc<dyn DocStore>, probe_limit: u64) -> Self {
        Self { store, probe_limit }
    }

    /// Find the smallest `n` such that `"<basename>-<n>"` is free.
    ///
    /// A store failure during the existence check aborts allocation and
    /// propagates unchanged.
    pub fn allocate(&self, basename: &str) -> MapperResult<DocId> {
        for n in 0..self.probe_limit {
            let id = DocId::indexed(basename, n);
            if !self.store.exists(&id)? {
                debug!(id = %id, probes = n + 1, "allocated document id");
                return Ok(id);
            }
        }
        Err(MapperError::AllocationExhausted {
            basename: basename.to_string(),
            limit: self.probe_limit,
        })
    }
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdAllocator")
            .field("probe_limit", &self.probe_limit)
            .finish()
    }
}
