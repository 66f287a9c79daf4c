//! Per-type field declarations.
//!
//! A [`TypeDescriptor`] is the static metadata the mapper consumes for one
//! entity type: which fields are scalars (copied verbatim into documents),
//! which are single references (stored as the referenced document's id), and
//! which are reference lists (stored as an ordered sequence of ids).
//! Descriptors are built once at process start and never mutated.

use std::collections::BTreeMap;
use std::fmt;

use arena_store::DOCUMENT_TYPE_FIELD;
use arena_types::TypeTag;

use crate::error::DescriptorError;

/// Category of a declared entity field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain value, copied into the document verbatim.
    Scalar,
    /// Holds one other entity; stored as that entity's id.
    Reference,
    /// Holds an ordered sequence of entities; stored as a sequence of ids.
    ReferenceList,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar => write!(f, "scalar"),
            FieldKind::Reference => write!(f, "reference"),
            FieldKind::ReferenceList => write!(f, "reference list"),
        }
    }
}

/// Static field declaration for one entity type.
#[derive(Debug)]
pub struct TypeDescriptor {
    tag: TypeTag,
    kinds: BTreeMap<String, FieldKind>,
    scalars: Vec<String>,
    references: Vec<String>,
    reference_lists: Vec<String>,
}

impl TypeDescriptor {
    /// Start declaring a type.
    pub fn builder(tag: TypeTag) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            tag,
            entries: Vec::new(),
        }
    }

    /// The type tag this descriptor declares.
    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    /// The category of a declared field, or `None` if undeclared.
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.kinds.get(field).copied()
    }

    /// Scalar field names, in declaration order.
    pub fn scalar_fields(&self) -> &[String] {
        &self.scalars
    }

    /// Single-reference field names, in declaration order.
    pub fn reference_fields(&self) -> &[String] {
        &self.references
    }

    /// Reference-list field names, in declaration order.
    pub fn reference_list_fields(&self) -> &[String] {
        &self.reference_lists
    }
}

/// Builder for [`TypeDescriptor`].
///
/// Declaration mistakes (a field in two categories, a reserved or empty
/// field name) surface from [`build`](TypeDescriptorBuilder::build); they are
/// never runtime conditions.
pub struct TypeDescriptorBuilder {
    tag: TypeTag,
    entries: Vec<(String, FieldKind)>,
}

impl TypeDescriptorBuilder {
    /// Declare a scalar field.
    pub fn scalar(mut self, field: &str) -> Self {
        self.entries.push((field.to_string(), FieldKind::Scalar));
        self
    }

    /// Declare a single-reference field.
    pub fn reference(mut self, field: &str) -> Self {
        self.entries.push((field.to_string(), FieldKind::Reference));
        self
    }

    /// Declare a reference-list field.
    pub fn reference_list(mut self, field: &str) -> Self {
        self.entries
            .push((field.to_string(), FieldKind::ReferenceList));
        self
    }

    /// Validate the declaration and build the descriptor.
    pub fn build(self) -> Result<TypeDescriptor, DescriptorError> {
        let mut kinds = BTreeMap::new();
        let mut scalars = Vec::new();
        let mut references = Vec::new();
        let mut reference_lists = Vec::new();

        for (field, kind) in self.entries {
            if field.is_empty() {
                return Err(DescriptorError::EmptyField {
                    tag: self.tag.clone(),
                });
            }
            if field == DOCUMENT_TYPE_FIELD {
                return Err(DescriptorError::ReservedField {
                    tag: self.tag.clone(),
                    field,
                });
            }
            if kinds.insert(field.clone(), kind).is_some() {
                return Err(DescriptorError::DuplicateField {
                    tag: self.tag.clone(),
                    field,
                });
            }
            match kind {
                FieldKind::Scalar => scalars.push(field),
                FieldKind::Reference => references.push(field),
                FieldKind::ReferenceList => reference_lists.push(field),
            }
        }

        Ok(TypeDescriptor {
            tag: self.tag,
            kinds,
            scalars,
            references,
            reference_lists,
        })
    }
}
