use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use arena_types::{DocId, TypeTag};

/// Reserved document key carrying the entity type tag.
pub const DOCUMENT_TYPE_FIELD: &str = "document_type";

/// Flat store-level representation of an entity.
///
/// A document is a mapping from field name to JSON value. Scalar fields are
/// copied verbatim; single-reference fields hold the referenced document's id
/// as a string; reference-list fields hold an ordered sequence of id strings.
/// The [`DOCUMENT_TYPE_FIELD`] key is reserved for the type tag and managed
/// through [`Document::set_type_tag`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Create an empty document tagged with the given entity type.
    pub fn new(tag: &TypeTag) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            DOCUMENT_TYPE_FIELD.to_string(),
            Value::String(tag.as_str().to_string()),
        );
        Self { fields }
    }

    /// Wrap a raw field mapping, e.g. one decoded from the store.
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// The type tag, if the document carries a well-formed one.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self.fields.get(DOCUMENT_TYPE_FIELD) {
            Some(Value::String(tag)) => TypeTag::new(tag.clone()).ok(),
            _ => None,
        }
    }

    /// Overwrite the type tag.
    pub fn set_type_tag(&mut self, tag: &TypeTag) {
        self.fields.insert(
            DOCUMENT_TYPE_FIELD.to_string(),
            Value::String(tag.as_str().to_string()),
        );
    }

    /// Read a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Read a single-reference field as a document id.
    pub fn get_reference(&self, field: &str) -> Option<DocId> {
        match self.fields.get(field) {
            Some(Value::String(id)) => Some(DocId::from_raw(id.clone())),
            _ => None,
        }
    }

    /// Read a reference-list field as an ordered sequence of document ids.
    ///
    /// Non-string elements are skipped; order and duplicates are preserved.
    pub fn get_reference_list(&self, field: &str) -> Option<Vec<DocId>> {
        match self.fields.get(field) {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(id) => Some(DocId::from_raw(id.clone())),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Write a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Write a single-reference field as the referenced id.
    pub fn insert_reference(&mut self, field: impl Into<String>, id: &DocId) {
        self.fields
            .insert(field.into(), Value::String(id.as_str().to_string()));
    }

    /// Write a reference-list field as an ordered sequence of ids.
    pub fn insert_reference_list(&mut self, field: impl Into<String>, ids: &[DocId]) {
        let items = ids
            .iter()
            .map(|id| Value::String(id.as_str().to_string()))
            .collect();
        self.fields.insert(field.into(), Value::Array(items));
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Iterate over all fields except the reserved type tag.
    pub fn data_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(|(name, _)| name.as_str() != DOCUMENT_TYPE_FIELD)
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields, including the type tag.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the document has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
