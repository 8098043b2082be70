//! Durable storage configuration

use std::path::PathBuf;

/// Configuration for the fjall-backed storage
#[derive(Clone)]
pub struct StorageConfig {
    /// Directory for storage data
    pub data_dir: PathBuf,

    /// Block cache size for fjall (in bytes)
    pub block_cache_size: u64,

    /// Persist mode applied after transaction-log writes
    pub persist_mode: fjall::PersistMode,
}

impl StorageConfig {
    /// Create a new config with the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            block_cache_size: 16 * 1024 * 1024, // 16 MB
            persist_mode: fjall::PersistMode::Buffer,
        }
    }

    /// Set block cache size
    pub fn with_block_cache_size(mut self, size: u64) -> Self {
        self.block_cache_size = size;
        self
    }

    /// Set persist mode
    ///
    /// `PersistMode::SyncAll` trades write latency for a log that survives
    /// power loss, not just process crash.
    pub fn with_persist_mode(mut self, mode: fjall::PersistMode) -> Self {
        self.persist_mode = mode;
        self
    }
}
