use arena_store::StoreError;
use arena_types::{DocId, TypeError, TypeTag};

use crate::descriptor::FieldKind;

/// Errors produced by mapper operations.
///
/// Nothing in the mapper is recovered silently: every failure surfaces to the
/// immediate caller as one of these variants, and no operation retries.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// The requested id has no document in the store.
    #[error("document not found: {0}")]
    NotFound(DocId),

    /// A document's type tag has no registered entity type.
    #[error("no entity type registered for tag {0}")]
    UnknownType(TypeTag),

    /// A stored document carries no type tag (store-integrity error).
    #[error("document {0} carries no type tag")]
    UntaggedDocument(DocId),

    /// A value of the wrong category was written to a declared field, e.g. a
    /// scalar value into a reference field.
    #[error("field {field:?} on {tag} entities is declared {declared}, cannot hold a {offered} value")]
    ReferenceType {
        tag: TypeTag,
        field: String,
        declared: FieldKind,
        offered: FieldKind,
    },

    /// The named field is not declared on the entity's type at all.
    #[error("no field {field:?} declared on {tag} entities")]
    UnknownField { tag: TypeTag, field: String },

    /// An entity of one type was used where another type was required.
    #[error("expected a {expected} entity, got {actual}")]
    TypeMismatch { expected: TypeTag, actual: TypeTag },

    /// The operation requires a persisted entity, but this one has no id yet.
    #[error("entity of type {0} has never been saved")]
    UnsavedEntity(TypeTag),

    /// The id probe hit its ceiling without finding a free id.
    #[error("id allocation for basename {basename:?} gave up after {limit} probes")]
    AllocationExhausted { basename: String, limit: u64 },

    /// The underlying store failed; propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A malformed type descriptor declaration.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// An invalid id or type tag token.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Errors from constructing a [`TypeDescriptor`](crate::TypeDescriptor).
///
/// These are programmer errors in a type declaration, caught when the
/// descriptor is built, never at save/load time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// A field name appears in more than one category.
    #[error("field {field:?} declared twice on {tag} entities")]
    DuplicateField { tag: TypeTag, field: String },

    /// A field name collides with a reserved document key.
    #[error("field name {field:?} on {tag} entities is reserved")]
    ReservedField { tag: TypeTag, field: String },

    /// A field name is empty.
    #[error("empty field name declared on {tag} entities")]
    EmptyField { tag: TypeTag },
}

/// Result alias for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;
