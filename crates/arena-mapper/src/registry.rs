//! The type tag → entity type registry.
//!
//! The registry is the only place concrete entity types are named; the
//! mapper engine itself stays type-agnostic. Each concrete type registers
//! its [`TypeDescriptor`] once at process start, and the engine resolves a
//! document's type tag through the registry when rehydrating. The descriptor
//! doubles as the type's factory: construction from a field mapping is
//! data-driven, replacing any hand-written dispatch on tag strings.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use arena_types::TypeTag;

use crate::descriptor::TypeDescriptor;
use crate::entity::{Entity, EntityHandle};
use crate::error::{MapperError, MapperResult};

/// Process-wide mapping from type tag to entity type descriptor.
///
/// Expected usage is register-everything-at-startup, read-only afterwards.
/// Registering a tag twice replaces the earlier descriptor (last wins).
pub struct TypeRegistry {
    types: RwLock<HashMap<TypeTag, Arc<TypeDescriptor>>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Register an entity type under its own tag.
    pub fn register(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        let mut types = self.types.write().expect("lock poisoned");
        types.insert(descriptor.tag().clone(), Arc::clone(&descriptor));
        descriptor
    }

    /// Resolve a tag to its registered descriptor.
    pub fn resolve(&self, tag: &TypeTag) -> MapperResult<Arc<TypeDescriptor>> {
        let types = self.types.read().expect("lock poisoned");
        types
            .get(tag)
            .map(Arc::clone)
            .ok_or_else(|| MapperError::UnknownType(tag.clone()))
    }

    /// Returns `true` if a descriptor is registered for `tag`.
    pub fn is_registered(&self, tag: &TypeTag) -> bool {
        self.types.read().expect("lock poisoned").contains_key(tag)
    }

    /// Construct a fresh, unsaved entity of the given registered type.
    pub fn instantiate(&self, tag: &TypeTag) -> MapperResult<EntityHandle> {
        Ok(Entity::new(self.resolve(tag)?))
    }

    /// All registered tags, sorted.
    pub fn tags(&self) -> Vec<TypeTag> {
        let types = self.types.read().expect("lock poisoned");
        let mut tags: Vec<TypeTag> = types.keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
