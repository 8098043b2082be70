//! Storage substrate for the Bazaar saga engine
//!
//! This crate defines the [`Storage`] contract consumed by the transaction
//! coordinator (TTL key-value cache, token-based distributed lock, durable
//! transaction log) and two implementations:
//! - [`MemoryStorage`]: mutex-guarded maps, for tests and single-process use
//! - [`FjallStorage`]: durable fjall keyspace whose transaction log survives
//!   restart

mod config;
mod durable;
mod error;
mod memory;
mod storage;

pub use config::StorageConfig;
pub use durable::FjallStorage;
pub use error::{Result, StorageError};
pub use memory::MemoryStorage;
pub use storage::Storage;
