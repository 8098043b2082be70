//! In-memory storage backend
//!
//! Mutex-guarded maps with lazy TTL expiry. The single mutex makes lock
//! acquisition a synchronous check-and-set, which is all the atomicity the
//! lock contract asks of an in-process backend.

use crate::error::{Result, StorageError};
use crate::storage::Storage;
use async_trait::async_trait;
use bazaar_common::{OpState, TransactionId, TransactionLog, TxState, now_millis};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

/// A cached value with optional expiry
#[derive(Debug, Clone)]
struct TtlEntry {
    value: serde_json::Value,
    expires_at: Option<i64>,
}

impl TtlEntry {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }
}

/// A held lock: opaque token plus expiry
#[derive(Debug, Clone)]
struct LockEntry {
    token: String,
    expires_at: i64,
}

impl LockEntry {
    fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, TtlEntry>,
    locks: HashMap<String, LockEntry>,
    transactions: HashMap<TransactionId, TransactionLog>,
}

/// In-memory [`Storage`] implementation
///
/// Suitable for tests and single-process deployments. Expired entries are
/// treated as absent at read time; [`MemoryStorage::purge_expired`] can be
/// called periodically for memory hygiene.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired cache entries and locks, returning how many were removed
    ///
    /// Purely a hygiene operation: lazy expiry already makes expired state
    /// unobservable through the trait.
    pub fn purge_expired(&self) -> usize {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let before = inner.entries.len() + inner.locks.len();
        inner.entries.retain(|_, e| !e.is_expired(now));
        inner.locks.retain(|_, l| !l.is_expired(now));
        before - (inner.entries.len() + inner.locks.len())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now_millis()) => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl_ms: Option<u64>) -> Result<()> {
        let expires_at = ttl_ms.map(|ttl| now_millis() + ttl as i64);
        self.inner
            .lock()
            .entries
            .insert(key.to_string(), TtlEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        match inner.entries.remove(key) {
            // An expired entry counts as already absent
            Some(entry) => Ok(!entry.is_expired(now_millis())),
            None => Ok(false),
        }
    }

    async fn acquire_lock(&self, key: &str, ttl_ms: u64) -> Result<Option<String>> {
        let now = now_millis();
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.locks.get(key) {
            if !existing.is_expired(now) {
                return Ok(None);
            }
        }

        let token = Uuid::new_v4().to_string();
        inner.locks.insert(
            key.to_string(),
            LockEntry {
                token: token.clone(),
                expires_at: now + ttl_ms as i64,
            },
        );
        Ok(Some(token))
    }

    async fn release_lock(&self, key: &str, token: &str) -> Result<bool> {
        let now = now_millis();
        let mut inner = self.inner.lock();

        match inner.locks.get(key) {
            Some(held) if held.token == token && !held.is_expired(now) => {
                inner.locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save_transaction(&self, log: &TransactionLog) -> Result<()> {
        self.inner.lock().transactions.insert(log.id, log.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionLog>> {
        Ok(self.inner.lock().transactions.get(&id).cloned())
    }

    async fn update_transaction_state(&self, id: TransactionId, state: TxState) -> Result<()> {
        let mut inner = self.inner.lock();
        let log = inner
            .transactions
            .get_mut(&id)
            .ok_or(StorageError::TransactionNotFound(id))?;
        log.state = state;
        log.updated_at = now_millis();
        Ok(())
    }

    async fn update_operation_state(
        &self,
        id: TransactionId,
        index: usize,
        state: OpState,
        error: Option<String>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let log = inner
            .transactions
            .get_mut(&id)
            .ok_or(StorageError::TransactionNotFound(id))?;
        let len = log.operations.len();
        let record = log
            .operations
            .get_mut(index)
            .ok_or(StorageError::OperationIndexOutOfBounds { id, index, len })?;
        record.state = state;
        record.error = error;
        log.updated_at = now_millis();
        Ok(())
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        self.inner.lock().transactions.remove(&id);
        Ok(())
    }

    async fn get_pending_transactions(
        &self,
        server_id: Option<&str>,
    ) -> Result<Vec<TransactionLog>> {
        let inner = self.inner.lock();
        let mut logs: Vec<TransactionLog> = inner
            .transactions
            .values()
            .filter(|log| log.state.is_in_flight())
            .filter(|log| match server_id {
                Some(sid) => log.server_id() == Some(sid),
                None => true,
            })
            .cloned()
            .collect();
        // Stable order for callers iterating recovery decisions
        logs.sort_by_key(|log| log.id);
        Ok(logs)
    }
}
