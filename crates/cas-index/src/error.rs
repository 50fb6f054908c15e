//! Error types for the index crate.

use cas_types::{ContentId, TypeError};

/// Errors from the index itself.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The backing store failed or aborted a transaction.
    #[error("index backend error: {0}")]
    Backend(String),

    /// An entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A key failed validation.
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<sled::Error> for IndexError {
    fn from(e: sled::Error) -> Self {
        IndexError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors from named-object operations.
#[derive(Debug, thiserror::Error)]
pub enum NamedError {
    /// No entry exists for the key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// An entry exists but the blob it names is gone.
    #[error("index entry {key} references missing blob {id}")]
    MissingBlob { key: String, id: ContentId },

    #[error(transparent)]
    Store(#[from] cas_store::StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// A blocking index task panicked or was cancelled.
    #[error("index task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience alias for named-object results.
pub type NamedResult<T> = Result<T, NamedError>;
