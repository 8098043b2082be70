//! Error types for the storage layer

use bazaar_common::TransactionId;
use thiserror::Error;

/// Storage error types
///
/// Contract violations against the log store (unknown id, bad index) are
/// storage-layer failures, deliberately distinct from operation-level
/// business failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Operation index {index} out of bounds for transaction {id} ({len} operations)")]
    OperationIndexOutOfBounds {
        id: TransactionId,
        index: usize,
        len: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<fjall::Error> for StorageError {
    fn from(e: fjall::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
