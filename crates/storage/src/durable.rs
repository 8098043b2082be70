//! Durable storage backend on fjall
//!
//! Three partitions: `kv` (TTL cache), `locks`, and `transactions` (the
//! saga log). Values are JSON so the on-disk transaction records carry the
//! same shape as the durable contract.
//!
//! Lock check-and-set is serialized by an in-process mutex, which is
//! sufficient for a single server owning its keyspace; a shared networked
//! backend would need an atomic primitive (`SET key token NX PX ttl`).

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::storage::Storage;
use async_trait::async_trait;
use bazaar_common::{OpState, TransactionId, TransactionLog, TxState, now_millis};
use fjall::{Keyspace, Partition, PartitionCreateOptions};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-disk shape of a cached value
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

impl StoredEntry {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }
}

/// On-disk shape of a held lock
#[derive(Debug, Serialize, Deserialize)]
struct StoredLock {
    token: String,
    expires_at: i64,
}

impl StoredLock {
    fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Fjall-backed [`Storage`] implementation
///
/// Transaction logs written here survive restart, which is what makes the
/// crash-recovery sweep possible.
pub struct FjallStorage {
    keyspace: Keyspace,
    kv: Partition,
    locks: Partition,
    transactions: Partition,

    /// Serializes lock check-and-set across tasks
    lock_guard: Mutex<()>,

    persist_mode: fjall::PersistMode,
}

impl FjallStorage {
    /// Open (or create) storage at the configured directory
    pub fn open(config: StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let keyspace = fjall::Config::new(&config.data_dir)
            .cache_size(config.block_cache_size)
            .open()?;

        let kv = keyspace.open_partition("kv", PartitionCreateOptions::default())?;
        let locks = keyspace.open_partition("locks", PartitionCreateOptions::default())?;
        let transactions = keyspace.open_partition(
            "transactions",
            PartitionCreateOptions::default().compression(fjall::CompressionType::None),
        )?;

        Ok(Self {
            keyspace,
            kv,
            locks,
            transactions,
            lock_guard: Mutex::new(()),
            persist_mode: config.persist_mode,
        })
    }

    fn persist(&self) -> Result<()> {
        self.keyspace.persist(self.persist_mode)?;
        Ok(())
    }

    fn load_log(&self, id: TransactionId) -> Result<Option<TransactionLog>> {
        match self.transactions.get(id.to_string().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store_log(&self, log: &TransactionLog) -> Result<()> {
        let bytes = serde_json::to_vec(log)?;
        self.transactions.insert(log.id.to_string().as_bytes(), bytes)?;
        self.persist()
    }
}

#[async_trait]
impl Storage for FjallStorage {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self.kv.get(key.as_bytes())? {
            Some(bytes) => {
                let entry: StoredEntry = serde_json::from_slice(&bytes)?;
                if entry.is_expired(now_millis()) {
                    // Lazy expiry: drop the dead entry on the way out
                    self.kv.remove(key.as_bytes())?;
                    Ok(None)
                } else {
                    Ok(Some(entry.value))
                }
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl_ms: Option<u64>) -> Result<()> {
        let entry = StoredEntry {
            value,
            expires_at: ttl_ms.map(|ttl| now_millis() + ttl as i64),
        };
        self.kv.insert(key.as_bytes(), serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match self.kv.get(key.as_bytes())? {
            Some(bytes) => {
                let entry: StoredEntry = serde_json::from_slice(&bytes)?;
                self.kv.remove(key.as_bytes())?;
                Ok(!entry.is_expired(now_millis()))
            }
            None => Ok(false),
        }
    }

    async fn acquire_lock(&self, key: &str, ttl_ms: u64) -> Result<Option<String>> {
        let _guard = self.lock_guard.lock();
        let now = now_millis();

        if let Some(bytes) = self.locks.get(key.as_bytes())? {
            let held: StoredLock = serde_json::from_slice(&bytes)?;
            if !held.is_expired(now) {
                return Ok(None);
            }
        }

        let token = Uuid::new_v4().to_string();
        let lock = StoredLock {
            token: token.clone(),
            expires_at: now + ttl_ms as i64,
        };
        self.locks.insert(key.as_bytes(), serde_json::to_vec(&lock)?)?;
        Ok(Some(token))
    }

    async fn release_lock(&self, key: &str, token: &str) -> Result<bool> {
        let _guard = self.lock_guard.lock();

        match self.locks.get(key.as_bytes())? {
            Some(bytes) => {
                let held: StoredLock = serde_json::from_slice(&bytes)?;
                if held.token == token && !held.is_expired(now_millis()) {
                    self.locks.remove(key.as_bytes())?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Ok(false),
        }
    }

    async fn save_transaction(&self, log: &TransactionLog) -> Result<()> {
        self.store_log(log)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionLog>> {
        self.load_log(id)
    }

    async fn update_transaction_state(&self, id: TransactionId, state: TxState) -> Result<()> {
        let mut log = self
            .load_log(id)?
            .ok_or(StorageError::TransactionNotFound(id))?;
        log.state = state;
        log.updated_at = now_millis();
        self.store_log(&log)
    }

    async fn update_operation_state(
        &self,
        id: TransactionId,
        index: usize,
        state: OpState,
        error: Option<String>,
    ) -> Result<()> {
        let mut log = self
            .load_log(id)?
            .ok_or(StorageError::TransactionNotFound(id))?;
        let len = log.operations.len();
        let record = log
            .operations
            .get_mut(index)
            .ok_or(StorageError::OperationIndexOutOfBounds { id, index, len })?;
        record.state = state;
        record.error = error;
        log.updated_at = now_millis();
        self.store_log(&log)
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        self.transactions.remove(id.to_string().as_bytes())?;
        self.persist()
    }

    async fn get_pending_transactions(
        &self,
        server_id: Option<&str>,
    ) -> Result<Vec<TransactionLog>> {
        let mut logs = Vec::new();
        for entry in self.transactions.iter() {
            let (_key, bytes) = entry?;
            let log: TransactionLog = serde_json::from_slice(&bytes)?;
            if !log.state.is_in_flight() {
                continue;
            }
            if let Some(sid) = server_id {
                if log.server_id() != Some(sid) {
                    continue;
                }
            }
            logs.push(log);
        }
        logs.sort_by_key(|log| log.id);
        Ok(logs)
    }
}
