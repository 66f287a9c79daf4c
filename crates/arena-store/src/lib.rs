//! Document storage seam for the arena mapper.
//!
//! This crate defines the boundary between the mapper and whatever document
//! service actually persists data. The mapper only ever sees the
//! [`DocStore`] trait: an opaque key/value document service supporting
//! existence checks, reads, keyed writes, and store-assigned creation.
//!
//! # Document Shape
//!
//! A [`Document`] is a flat mapping from field name to JSON value with one
//! reserved key, [`DOCUMENT_TYPE_FIELD`], carrying the entity type tag.
//! Reference fields are stored as the referenced document's id (single
//! reference) or an ordered sequence of ids (reference list); the store
//! itself never interprets them.
//!
//! # Storage Backends
//!
//! - [`InMemoryDocStore`] — `HashMap`-based store for tests and embedding
//!
//! Network-backed document services implement [`DocStore`] outside this
//! workspace; their protocol is not part of the mapper.
//!
//! # Design Rules
//!
//! 1. `get` returns `Ok(None)` for a missing id; absence is not an error at
//!    this layer.
//! 2. `put` is an unconditional upsert; last writer wins.
//! 3. Store calls are blocking; timeouts and retries belong to the backend
//!    or the caller, never to this seam.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod document;
pub mod error;
pub mod memory;
pub mod traits;

pub use document::{Document, DOCUMENT_TYPE_FIELD};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDocStore;
pub use traits::DocStore;
