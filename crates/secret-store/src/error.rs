//! Error types for secret storage

/// Errors from secret store writes and deletes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for secret store operations.
pub type Result<T> = std::result::Result<T, StorageError>;
