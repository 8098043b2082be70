//! The storage contract consumed by the transaction coordinator
//!
//! One trait carries the three concerns a saga needs from its substrate:
//! a generic TTL key-value cache, a token-based distributed lock, and the
//! durable transaction log used for crash recovery.

use crate::error::Result;
use async_trait::async_trait;
use bazaar_common::{OpState, TransactionId, TransactionLog, TxState};

/// Storage substrate for the saga engine
///
/// Implementations must make `acquire_lock` atomic under concurrent
/// callers: an in-process backend uses a single synchronous check-and-set,
/// a networked backend needs an atomic primitive such as `SET key token NX
/// PX ttl`.
#[async_trait]
pub trait Storage: Send + Sync {
    // --- TTL key-value cache ---

    /// Read a value; `None` if absent or expired (lazy expiry, checked at
    /// read time)
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Unconditional overwrite, with optional expiry
    async fn set(&self, key: &str, value: serde_json::Value, ttl_ms: Option<u64>) -> Result<()>;

    /// Remove an entry; `true` if one existed. Idempotent.
    async fn delete(&self, key: &str) -> Result<bool>;

    // --- Distributed lock ---

    /// Try to take the lock on `key` for `ttl_ms`
    ///
    /// Returns a fresh opaque token on success, `None` while a live
    /// (non-expired) holder exists. Expiry is the sole self-healing path
    /// for a crashed holder.
    async fn acquire_lock(&self, key: &str, ttl_ms: u64) -> Result<Option<String>>;

    /// Release the lock on `key`, but only if `token` is the currently
    /// held token
    ///
    /// The token check guards against releasing a lock that expired and
    /// was re-acquired by someone else. Returns `false` on mismatch,
    /// expiry, or when no lock is held.
    async fn release_lock(&self, key: &str, token: &str) -> Result<bool>;

    // --- Transaction log ---

    /// Upsert a transaction log by id
    async fn save_transaction(&self, log: &TransactionLog) -> Result<()>;

    /// Load a transaction log, `None` if unknown
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionLog>>;

    /// Set the transaction state and bump `updatedAt`
    ///
    /// Fails with [`StorageError::TransactionNotFound`] for an unknown id.
    ///
    /// [`StorageError::TransactionNotFound`]: crate::StorageError::TransactionNotFound
    async fn update_transaction_state(&self, id: TransactionId, state: TxState) -> Result<()>;

    /// Set one operation record's state (and optional error) in place
    ///
    /// Unknown id or out-of-bounds index is a storage-layer contract
    /// violation, surfaced as an error rather than a panic.
    async fn update_operation_state(
        &self,
        id: TransactionId,
        index: usize,
        state: OpState,
        error: Option<String>,
    ) -> Result<()>;

    /// Remove a transaction log. Idempotent.
    async fn delete_transaction(&self, id: TransactionId) -> Result<()>;

    /// All logs still in flight (`pending` or `executing`), optionally
    /// filtered to one server's transactions
    ///
    /// This is the sole crash-recovery primitive: on restart a server
    /// scans its own orphans and decides how to settle them.
    async fn get_pending_transactions(&self, server_id: Option<&str>)
        -> Result<Vec<TransactionLog>>;
}
