use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid type tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("invalid document id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },
}
