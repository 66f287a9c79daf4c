//! Entity type tags.
//!
//! Every stored document carries a type tag naming the entity type it
//! deserializes into (e.g. `"task"`, `"submission"`). Tags double as the
//! default basename for allocator-produced document ids, so they follow the
//! same restricted alphabet.
//!
//! Valid tags:
//! - Must be non-empty
//! - Must start with a lowercase ASCII letter
//! - May contain only lowercase ASCII letters, digits, and `_`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Tag naming a registered entity type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    /// Validate and wrap a type tag.
    pub fn new(tag: impl Into<String>) -> Result<Self, TypeError> {
        let tag = tag.into();
        let mut chars = tag.chars();
        match chars.next() {
            None => {
                return Err(TypeError::InvalidTag {
                    tag,
                    reason: "tag must not be empty".into(),
                });
            }
            Some(first) if !first.is_ascii_lowercase() => {
                return Err(TypeError::InvalidTag {
                    tag: tag.clone(),
                    reason: format!("must start with a lowercase letter, got {first:?}"),
                });
            }
            Some(_) => {}
        }
        for ch in chars {
            if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_') {
                return Err(TypeError::InvalidTag {
                    tag: tag.clone(),
                    reason: format!("contains forbidden character: {ch:?}"),
                });
            }
        }
        Ok(Self(tag))
    }

    /// The raw tag string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.0
    }
}
