//! The process-wide identity map.
//!
//! [`IdentityCache`] maps each document id to the single live
//! [`EntityHandle`] for that id. It exists purely to preserve object
//! identity, not to bound memory: there is no expiry policy, and entries
//! live until explicitly evicted or the cache is dropped. Services wanting
//! isolation scope one cache (and one mapper) per request or session
//! instead of sharing a process-wide instance.
//!
//! Entities resolved into a cyclic graph hold strong handles to one another,
//! so evicting one member of a cycle does not reclaim it; the cycle is freed
//! when the last outside handle drops, at the latest at process teardown.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use arena_types::DocId;

use crate::entity::EntityHandle;

/// Flat, unbounded map from document id to the live instance for that id.
pub struct IdentityCache {
    entries: RwLock<HashMap<DocId, EntityHandle>>,
}

impl IdentityCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached instance for `id`, if present.
    pub fn lookup(&self, id: &DocId) -> Option<EntityHandle> {
        let entries = self.entries.read().expect("lock poisoned");
        entries.get(id).map(Arc::clone)
    }

    /// Insert or overwrite the mapping for `id`.
    ///
    /// Used once per freshly loaded or freshly created entity.
    pub fn register(&self, id: &DocId, entity: &EntityHandle) {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.insert(id.clone(), Arc::clone(entity));
    }

    /// Insert `entity` under `id` unless an instance is already registered,
    /// returning whichever instance the cache now holds.
    ///
    /// This is the atomic check-then-register step: a caller that lost a
    /// load race gets the winner's instance back instead of clobbering it.
    pub fn register_or_existing(&self, id: &DocId, entity: &EntityHandle) -> EntityHandle {
        let mut entries = self.entries.write().expect("lock poisoned");
        Arc::clone(
            entries
                .entry(id.clone())
                .or_insert_with(|| Arc::clone(entity)),
        )
    }

    /// Remove the mapping for `id`, returning `true` if it existed.
    pub fn evict(&self, id: &DocId) -> bool {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.remove(id).is_some()
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("IdentityCache")
            .field("entry_count", &count)
            .finish()
    }
}
