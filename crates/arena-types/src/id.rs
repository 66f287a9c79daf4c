use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque identifier for a stored document.
///
/// A `DocId` is a globally unique string token. Once bound to an entity it
/// never changes for that entity's lifetime. Ids come in two flavors:
/// allocator-produced tokens of the form `"<basename>-<n>"` (e.g. `"task-0"`)
/// and opaque store-assigned ids. Both are treated the same everywhere.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Wrap a raw id string.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the indexed id token `"<basename>-<n>"`.
    pub fn indexed(basename: &str, n: u64) -> Self {
        Self(format!("{basename}-{n}"))
    }

    /// Parse a non-empty id, rejecting whitespace.
    pub fn parse(id: &str) -> Result<Self, TypeError> {
        if id.is_empty() {
            return Err(TypeError::InvalidId {
                id: id.to_string(),
                reason: "id must not be empty".into(),
            });
        }
        if id.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidId {
                id: id.to_string(),
                reason: "id must not contain whitespace".into(),
            });
        }
        Ok(Self(id.to_string()))
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split an indexed id back into `(basename, n)`.
    ///
    /// Returns `None` for ids that do not end in `-<n>` (store-assigned ids,
    /// or basenames containing a trailing dash with no digits).
    pub fn split_indexed(&self) -> Option<(&str, u64)> {
        let (basename, digits) = self.0.rsplit_once('-')?;
        if basename.is_empty() {
            return None;
        }
        let n: u64 = digits.parse().ok()?;
        Some((basename, n))
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", self.0)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> Self {
        id.0
    }
}
