//! Error types for the coordinator

use bazaar_common::{TransactionId, TxState};
use bazaar_storage::StorageError;
use thiserror::Error;

/// Coordinator error types
///
/// Business failures (a validation rejection, a failed execute) are not
/// errors: they come back inside the returned transaction outcome. Errors
/// are reserved for resource contention, storage faults, and contract
/// violations.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Transaction has no operations")]
    EmptyTransaction,

    #[error("Failed to acquire lock on resource: {key}")]
    LockAcquisition { key: String },

    #[error("Invalid state transition for transaction {id}: {from} -> {to}")]
    InvalidTransition {
        id: TransactionId,
        from: TxState,
        to: TxState,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
