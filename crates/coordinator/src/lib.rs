//! Transaction coordinator for the Bazaar saga engine
//!
//! Ties the storage substrate and the operation layer together: acquires
//! resource locks, validates every operation before any mutation, executes
//! sequentially, compensates the executed prefix in reverse on the first
//! failure, and persists each state transition for crash recovery.

mod config;
mod coordinator;
mod error;
mod recovery;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, TransactionOutcome};
pub use error::{CoordinatorError, Result};
pub use recovery::RecoveryOutcome;
