//! Live entity instances.
//!
//! An [`Entity`] is the in-memory form of one stored document: a type
//! descriptor plus interior-mutable field state behind a `RwLock`. Entities
//! are always handled through [`EntityHandle`] (an `Arc`), because object
//! identity is the point: the identity cache guarantees at most one live
//! instance per document id, and every holder of a handle observes the same
//! mutations. Identity comparison is pointer comparison
//! ([`Entity::same_instance`]), never value comparison.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use arena_store::Document;
use arena_types::{DocId, TypeTag};

use crate::descriptor::{FieldKind, TypeDescriptor};
use crate::error::{MapperError, MapperResult};

/// Shared handle to a live entity. Clones are cheap and refer to the same
/// instance.
pub type EntityHandle = Arc<Entity>;

/// Resolution state of one reference slot.
///
/// A slot is `Raw` between the moment a document is read and the moment the
/// mapper resolves the id into a live handle; application code normally only
/// ever observes `Resolved` slots.
#[derive(Clone)]
pub enum RefSlot {
    /// The referenced document's id, not yet resolved.
    Raw(DocId),
    /// A live handle to the referenced entity.
    Resolved(EntityHandle),
}

impl fmt::Debug for RefSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSlot::Raw(id) => write!(f, "Raw({id})"),
            // Do not recurse into the target: reference graphs may be cyclic.
            RefSlot::Resolved(entity) => write!(f, "Resolved({})", entity.describe()),
        }
    }
}

#[derive(Default)]
struct EntityState {
    id: Option<DocId>,
    scalars: BTreeMap<String, Value>,
    references: BTreeMap<String, RefSlot>,
    reference_lists: BTreeMap<String, Vec<RefSlot>>,
}

/// In-memory typed object corresponding 1:1 with a document id.
pub struct Entity {
    descriptor: Arc<TypeDescriptor>,
    state: RwLock<EntityState>,
}

impl Entity {
    /// Create a fresh, unsaved entity with no fields set.
    ///
    /// The entity has no id until it is first saved.
    pub fn new(descriptor: Arc<TypeDescriptor>) -> EntityHandle {
        Arc::new(Self {
            descriptor,
            state: RwLock::new(EntityState::default()),
        })
    }

    /// Construct an entity from a stored document.
    ///
    /// Declared scalar fields present in the document are copied; declared
    /// reference fields are installed as unresolved [`RefSlot::Raw`] slots.
    /// Undeclared document keys are ignored here (and preserved store-side by
    /// the save overlay).
    pub(crate) fn from_document(descriptor: Arc<TypeDescriptor>, doc: &Document) -> EntityHandle {
        let entity = Self::new(descriptor);
        entity.apply_document(doc);
        entity
    }

    /// The per-type field declaration.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// The entity's type tag.
    pub fn type_tag(&self) -> TypeTag {
        self.descriptor.tag().clone()
    }

    /// The document id, or `None` for a fresh entity that was never saved.
    pub fn id(&self) -> Option<DocId> {
        self.state.read().expect("lock poisoned").id.clone()
    }

    /// Returns `true` if `a` and `b` are the same live instance.
    pub fn same_instance(a: &EntityHandle, b: &EntityHandle) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// Bind the document id. An id is immutable once bound.
    pub(crate) fn bind_id(&self, id: DocId) {
        let mut state = self.state.write().expect("lock poisoned");
        debug_assert!(
            state.id.is_none() || state.id.as_ref() == Some(&id),
            "document id is immutable once bound"
        );
        state.id = Some(id);
    }

    fn expect_kind(&self, field: &str, offered: FieldKind) -> MapperResult<()> {
        match self.descriptor.kind_of(field) {
            None => Err(MapperError::UnknownField {
                tag: self.type_tag(),
                field: field.to_string(),
            }),
            Some(declared) if declared == offered => Ok(()),
            Some(declared) => Err(MapperError::ReferenceType {
                tag: self.type_tag(),
                field: field.to_string(),
                declared,
                offered,
            }),
        }
    }

    /// Read a scalar field.
    pub fn scalar(&self, field: &str) -> MapperResult<Option<Value>> {
        self.expect_kind(field, FieldKind::Scalar)?;
        let state = self.state.read().expect("lock poisoned");
        Ok(state.scalars.get(field).cloned())
    }

    /// Write a scalar field.
    pub fn set_scalar(&self, field: &str, value: Value) -> MapperResult<()> {
        self.expect_kind(field, FieldKind::Scalar)?;
        let mut state = self.state.write().expect("lock poisoned");
        state.scalars.insert(field.to_string(), value);
        Ok(())
    }

    /// Read a single-reference field as a live handle.
    ///
    /// Returns `None` when the field is unset, or while it is still an
    /// unresolved id mid-load.
    pub fn reference(&self, field: &str) -> MapperResult<Option<EntityHandle>> {
        self.expect_kind(field, FieldKind::Reference)?;
        let state = self.state.read().expect("lock poisoned");
        Ok(match state.references.get(field) {
            Some(RefSlot::Resolved(entity)) => Some(Arc::clone(entity)),
            _ => None,
        })
    }

    /// Point a single-reference field at another entity.
    pub fn set_reference(&self, field: &str, target: &EntityHandle) -> MapperResult<()> {
        self.expect_kind(field, FieldKind::Reference)?;
        let mut state = self.state.write().expect("lock poisoned");
        state
            .references
            .insert(field.to_string(), RefSlot::Resolved(Arc::clone(target)));
        Ok(())
    }

    /// Read a reference-list field as live handles, preserving order and
    /// duplicates. Unresolved entries are skipped; an unset field reads as
    /// an empty list.
    pub fn reference_list(&self, field: &str) -> MapperResult<Vec<EntityHandle>> {
        self.expect_kind(field, FieldKind::ReferenceList)?;
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .reference_lists
            .get(field)
            .into_iter()
            .flatten()
            .filter_map(|slot| match slot {
                RefSlot::Resolved(entity) => Some(Arc::clone(entity)),
                RefSlot::Raw(_) => None,
            })
            .collect())
    }

    /// Replace a reference-list field with an ordered sequence of entities.
    pub fn set_reference_list(&self, field: &str, targets: &[EntityHandle]) -> MapperResult<()> {
        self.expect_kind(field, FieldKind::ReferenceList)?;
        let slots = targets
            .iter()
            .map(|target| RefSlot::Resolved(Arc::clone(target)))
            .collect();
        let mut state = self.state.write().expect("lock poisoned");
        state.reference_lists.insert(field.to_string(), slots);
        Ok(())
    }

    /// Overwrite field state in place from a stored document.
    ///
    /// Scalars are replaced (and dropped when absent from the document);
    /// reference fields become unresolved `Raw` slots for the mapper to
    /// resolve. The instance itself is untouched, so every holder of a
    /// handle observes the update.
    pub(crate) fn apply_document(&self, doc: &Document) {
        let mut state = self.state.write().expect("lock poisoned");
        for field in self.descriptor.scalar_fields() {
            match doc.get(field) {
                Some(value) => {
                    state.scalars.insert(field.clone(), value.clone());
                }
                None => {
                    state.scalars.remove(field);
                }
            }
        }
        for field in self.descriptor.reference_fields() {
            match doc.get_reference(field) {
                Some(id) => {
                    state.references.insert(field.clone(), RefSlot::Raw(id));
                }
                None => {
                    state.references.remove(field);
                }
            }
        }
        for field in self.descriptor.reference_list_fields() {
            match doc.get_reference_list(field) {
                Some(ids) => {
                    state
                        .reference_lists
                        .insert(field.clone(), ids.into_iter().map(RefSlot::Raw).collect());
                }
                None => {
                    state.reference_lists.remove(field);
                }
            }
        }
    }

    /// Snapshot of the declared scalar fields currently set.
    pub(crate) fn scalar_snapshot(&self) -> BTreeMap<String, Value> {
        self.state.read().expect("lock poisoned").scalars.clone()
    }

    /// Current slot of a single-reference field.
    pub(crate) fn reference_slot(&self, field: &str) -> Option<RefSlot> {
        self.state
            .read()
            .expect("lock poisoned")
            .references
            .get(field)
            .cloned()
    }

    /// Current slots of a reference-list field, or `None` if unset.
    pub(crate) fn reference_list_slots(&self, field: &str) -> Option<Vec<RefSlot>> {
        self.state
            .read()
            .expect("lock poisoned")
            .reference_lists
            .get(field)
            .cloned()
    }

    /// Install a resolved single-reference slot.
    pub(crate) fn install_reference(&self, field: &str, slot: RefSlot) {
        let mut state = self.state.write().expect("lock poisoned");
        state.references.insert(field.to_string(), slot);
    }

    /// Install resolved reference-list slots.
    pub(crate) fn install_reference_list(&self, field: &str, slots: Vec<RefSlot>) {
        let mut state = self.state.write().expect("lock poisoned");
        state.reference_lists.insert(field.to_string(), slots);
    }

    fn describe(&self) -> String {
        match self.id() {
            Some(id) => format!("{} {id}", self.descriptor.tag()),
            None => format!("{} <unsaved>", self.descriptor.tag()),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("Entity")
            .field("tag", self.descriptor.tag())
            .field("id", &state.id)
            .field("scalars", &state.scalars.len())
            .finish()
    }
}
