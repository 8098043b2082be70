//! Error types for the operation layer

use thiserror::Error;

/// Operation error types
///
/// These are infrastructure faults (unreachable provider, malformed
/// definition). Expected business failures travel inside
/// [`OperationResult`] instead and are never raised as errors.
///
/// [`OperationResult`]: bazaar_common::OperationResult
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for operation-layer calls
pub type Result<T> = std::result::Result<T, OperationError>;
