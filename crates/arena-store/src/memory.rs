use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use arena_types::DocId;

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::traits::DocStore;

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. All documents are held in memory behind
/// a `RwLock` for safe concurrent access. Documents are cloned on read/write.
pub struct InMemoryDocStore {
    docs: RwLock<HashMap<DocId, Document>>,
}

impl InMemoryDocStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.docs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.docs.read().expect("lock poisoned").is_empty()
    }

    /// Remove all documents from the store.
    pub fn clear(&self) {
        self.docs.write().expect("lock poisoned").clear();
    }

    /// Remove a single document, returning `true` if it existed.
    ///
    /// The mapper never deletes documents; this supports tests that simulate
    /// a document vanishing from the store behind the cache's back.
    pub fn remove(&self, id: &DocId) -> bool {
        self.docs
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Return a sorted list of all document ids in the store.
    pub fn all_ids(&self) -> Vec<DocId> {
        let map = self.docs.read().expect("lock poisoned");
        let mut ids: Vec<DocId> = map.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryDocStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocStore for InMemoryDocStore {
    fn exists(&self, id: &DocId) -> StoreResult<bool> {
        let map = self.docs.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn get(&self, id: &DocId) -> StoreResult<Option<Document>> {
        let map = self.docs.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn put(&self, id: &DocId, doc: &Document) -> StoreResult<()> {
        let mut map = self.docs.write().expect("lock poisoned");
        map.insert(id.clone(), doc.clone());
        Ok(())
    }

    fn create(&self, doc: &Document) -> StoreResult<DocId> {
        let id = DocId::from_raw(Uuid::now_v7().to_string());
        let mut map = self.docs.write().expect("lock poisoned");
        if map.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        map.insert(id.clone(), doc.clone());
        Ok(id)
    }
}

impl std::fmt::Debug for InMemoryDocStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryDocStore")
            .field("document_count", &count)
            .finish()
    }
}
