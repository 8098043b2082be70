//! Common types for the Bazaar saga transaction engine
//!
//! This crate defines:
//! - The durable transaction log contract (`TransactionLog`, `OperationRecord`)
//! - Transaction and operation state machines
//! - The uniform `OperationResult` envelope returned by operation execution
//! - Transaction IDs (UUIDv7-based) and the request-scoped context

mod context;
mod log;
mod result;
mod state;
mod transaction_id;

pub use context::TransactionContext;
pub use log::{OperationRecord, TransactionLog, TransactionMetadata, now_millis};
pub use result::OperationResult;
pub use state::{OpState, TxState};
pub use transaction_id::TransactionId;
