//! Object-document mapper core for the arena system.
//!
//! This crate turns flat store documents into live, typed, graph-shaped
//! in-memory entities and back. It owns the three intertwined mechanisms the
//! rest of the system leans on:
//!
//! - **Id allocation** — collision-free human-readable ids of the form
//!   `"<basename>-<n>"`, discovered by linear probing against the store.
//! - **Identity caching** — a process-wide map from document id to the single
//!   live instance for that id. Two loads of the same id return the same
//!   instance; mutating the cached instance is the only sanctioned way to
//!   mutate that logical document from this process.
//! - **Reference resolution** — reference fields are stored as bare ids and
//!   rehydrated into live entity handles on load, recursively, with cycle
//!   safety coming from registering an entity in the cache *before* its
//!   references are resolved.
//!
//! # Modules
//!
//! - [`error`] — [`MapperError`] taxonomy and result alias
//! - [`descriptor`] — per-type field declarations ([`TypeDescriptor`])
//! - [`registry`] — type tag → descriptor registry ([`TypeRegistry`])
//! - [`entity`] — live entity instances ([`Entity`], [`EntityHandle`])
//! - [`cache`] — the identity map ([`IdentityCache`])
//! - [`alloc`] — linear-probe id allocation ([`IdAllocator`])
//! - [`engine`] — save / load / refresh / evict ([`Mapper`])

pub mod alloc;
pub mod cache;
pub mod descriptor;
pub mod engine;
pub mod entity;
pub mod error;
pub mod registry;

pub use alloc::{IdAllocator, DEFAULT_PROBE_LIMIT};
pub use cache::IdentityCache;
pub use descriptor::{FieldKind, TypeDescriptor, TypeDescriptorBuilder};
pub use engine::Mapper;
pub use entity::{Entity, EntityHandle, RefSlot};
pub use error::{DescriptorError, MapperError, MapperResult};
pub use registry::TypeRegistry;
