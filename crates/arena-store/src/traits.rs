use arena_types::DocId;

use crate::document::Document;
use crate::error::StoreResult;

/// Opaque key/value document service.
///
/// All implementations must satisfy these invariants:
/// - `get` returns `Ok(None)` for a missing id; absence is not an error at
///   this layer. Callers decide whether a miss is fatal.
/// - `put` is an unconditional upsert keyed by the caller's id; last writer
///   wins.
/// - `create` persists the document under a fresh store-assigned id and
///   returns that id.
/// - Calls are blocking and are never retried by the implementation; a
///   backend failure surfaces immediately as `Err`.
pub trait DocStore: Send + Sync {
    /// Check whether a document exists under the given id.
    fn exists(&self, id: &DocId) -> StoreResult<bool>;

    /// Read the document stored under `id`.
    ///
    /// Returns `Ok(None)` if no document exists under that id.
    fn get(&self, id: &DocId) -> StoreResult<Option<Document>>;

    /// Write `doc` under `id`, creating or overwriting.
    fn put(&self, id: &DocId, doc: &Document) -> StoreResult<()>;

    /// Persist `doc` under a fresh store-assigned id and return the id.
    fn create(&self, doc: &Document) -> StoreResult<DocId>;
}
