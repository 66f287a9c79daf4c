use arena_types::DocId;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable or refused the connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected an operation on a specific document.
    #[error("store rejected operation on {id}: {reason}")]
    Rejected { id: DocId, reason: String },

    /// `create` produced an id that already exists in the store.
    #[error("store assigned duplicate id {0}")]
    DuplicateId(DocId),

    /// Serialization or deserialization failure at the store boundary.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
