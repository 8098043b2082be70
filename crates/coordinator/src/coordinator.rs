//! Core coordinator implementation
//!
//! Drives a transaction through its lifecycle: lock the affected
//! resources, validate every operation, execute them in order, and on the
//! first failure compensate the executed prefix in strict reverse order.
//! Every state transition is persisted to the transaction log before the
//! next step runs, so a crash at any point is recoverable from the log.

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use bazaar_common::{
    OpState, TransactionContext, TransactionId, TransactionLog, TransactionMetadata, TxState,
};
use bazaar_operation::SagaOperation;
use bazaar_storage::{Storage, StorageError};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of running a transaction to a terminal state
#[derive(Debug)]
pub struct TransactionOutcome {
    /// The persisted log in its terminal state
    pub log: TransactionLog,

    /// One entry per compensation call that failed; compensation is
    /// best-effort, so these are surfaced for out-of-band retry rather
    /// than propagated
    pub compensation_warnings: Vec<String>,
}

impl TransactionOutcome {
    /// Whether the transaction committed
    pub fn committed(&self) -> bool {
        self.log.state == TxState::Committed
    }
}

/// Saga transaction coordinator
///
/// Owns the lifecycle of every [`TransactionLog`] it creates and is the
/// only writer to its state machine. Operations inside one transaction
/// run strictly sequentially; concurrency across transactions is mediated
/// solely by the distributed lock.
pub struct Coordinator<S: Storage> {
    storage: Arc<S>,
    config: CoordinatorConfig,
}

impl<S: Storage> Coordinator<S> {
    /// Create a coordinator over an explicit storage handle
    pub fn new(storage: Arc<S>, config: CoordinatorConfig) -> Self {
        Self { storage, config }
    }

    /// Storage handle this coordinator runs against
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub(crate) fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Build the request context passed to every operation: the generated
    /// transaction id stamped over the caller's metadata
    pub(crate) fn context_for(
        &self,
        id: TransactionId,
        metadata: HashMap<String, String>,
    ) -> TransactionContext {
        let mut ctx = TransactionContext::new(id);
        if let Some(server_id) = &self.config.server_id {
            ctx = ctx.with_server_id(server_id.clone());
        }
        ctx.metadata = metadata;
        ctx
    }

    /// Run a list of operations as one all-or-nothing transaction
    ///
    /// Business failures (validation rejection, execution failure) end in
    /// a returned outcome whose log is `failed` or `compensated`; `Err` is
    /// reserved for lock contention, storage faults, and an empty
    /// operation list. Lock contention aborts before any mutation, so
    /// callers may simply retry.
    pub async fn run(&self, operations: &[Arc<dyn SagaOperation>]) -> Result<TransactionOutcome> {
        self.run_with_metadata(operations, HashMap::new()).await
    }

    /// Like [`run`], with caller-supplied request metadata (tracing ids,
    /// audit tags) carried through the context to every provider call
    ///
    /// [`run`]: Coordinator::run
    pub async fn run_with_metadata(
        &self,
        operations: &[Arc<dyn SagaOperation>],
        metadata: HashMap<String, String>,
    ) -> Result<TransactionOutcome> {
        if operations.is_empty() {
            return Err(CoordinatorError::EmptyTransaction);
        }

        let id = TransactionId::new();
        let log_metadata = self
            .config
            .server_id
            .as_deref()
            .map(TransactionMetadata::for_server);
        let log = TransactionLog::new(id, operations.iter().map(|op| op.name()), log_metadata);
        self.storage.save_transaction(&log).await?;
        tracing::debug!(transaction_id = %id, operations = operations.len(), "transaction started");

        let held = match self.acquire_all_locks(id, operations).await {
            Ok(held) => held,
            Err(e) => {
                // Nothing was mutated; the log just records the abort
                if let Err(mark_err) = self.transition(id, TxState::Failed).await {
                    tracing::warn!(
                        transaction_id = %id,
                        error = %mark_err,
                        "failed to mark aborted transaction as failed"
                    );
                }
                return Err(e);
            }
        };

        let ctx = self.context_for(id, metadata);
        let drive_result = self.drive(id, &ctx, operations).await;
        self.release_locks(&held).await;

        let compensation_warnings = drive_result?;
        let log = self
            .storage
            .get_transaction(id)
            .await?
            .ok_or(StorageError::TransactionNotFound(id))?;
        Ok(TransactionOutcome {
            log,
            compensation_warnings,
        })
    }

    /// Persist a transaction state change, rejecting any write the state
    /// machine does not allow
    pub(crate) async fn transition(&self, id: TransactionId, next: TxState) -> Result<()> {
        let log = self
            .storage
            .get_transaction(id)
            .await?
            .ok_or(StorageError::TransactionNotFound(id))?;
        if !log.state.can_transition_to(next) {
            return Err(CoordinatorError::InvalidTransition {
                id,
                from: log.state,
                to: next,
            });
        }
        self.storage.update_transaction_state(id, next).await?;
        Ok(())
    }

    /// Deduplicated lock keys across all operations, first-seen order,
    /// scoped under the configured prefix
    fn lock_keys(&self, operations: &[Arc<dyn SagaOperation>]) -> Vec<String> {
        let prefix = self.config.lock_key_prefix.as_deref().unwrap_or("");
        let mut keys = Vec::new();
        for op in operations {
            for key in op.lock_keys() {
                let key = format!("{}{}", prefix, key);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Acquire every affected resource lock, or release what was taken
    /// and fail fast on the first contention
    async fn acquire_all_locks(
        &self,
        id: TransactionId,
        operations: &[Arc<dyn SagaOperation>],
    ) -> Result<Vec<(String, String)>> {
        let mut held: Vec<(String, String)> = Vec::new();
        for key in self.lock_keys(operations) {
            match self.storage.acquire_lock(&key, self.config.lock_ttl_ms).await {
                Ok(Some(token)) => held.push((key, token)),
                Ok(None) => {
                    tracing::debug!(transaction_id = %id, key = %key, "lock contention, aborting");
                    self.release_locks(&held).await;
                    return Err(CoordinatorError::LockAcquisition { key });
                }
                Err(e) => {
                    self.release_locks(&held).await;
                    return Err(e.into());
                }
            }
        }
        Ok(held)
    }

    /// Release held locks in reverse acquisition order
    ///
    /// A failed release is only a warning: the TTL reclaims the lock.
    pub(crate) async fn release_locks(&self, held: &[(String, String)]) {
        for (key, token) in held.iter().rev() {
            match self.storage.release_lock(key, token).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(key = %key, "lock was no longer held at release")
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "failed to release lock"),
            }
        }
    }

    /// Validate-all, execute-in-order, compensate-on-failure
    ///
    /// Returns the compensation warnings (empty on commit or pure
    /// validation failure).
    async fn drive(
        &self,
        id: TransactionId,
        ctx: &TransactionContext,
        operations: &[Arc<dyn SagaOperation>],
    ) -> Result<Vec<String>> {
        self.transition(id, TxState::Executing).await?;

        // Every operation must validate before any operation executes
        for (index, op) in operations.iter().enumerate() {
            let rejection = match op.validate(ctx).await {
                Ok(true) => None,
                Ok(false) => Some("validation failed".to_string()),
                Err(e) => Some(e.to_string()),
            };
            if let Some(error) = rejection {
                tracing::debug!(
                    transaction_id = %id,
                    operation = %op.name(),
                    error = %error,
                    "validation rejected transaction"
                );
                self.storage
                    .update_operation_state(id, index, OpState::Failed, Some(error))
                    .await?;
                self.transition(id, TxState::Failed).await?;
                // Zero mutation occurred, nothing to compensate
                return Ok(Vec::new());
            }
        }

        for (index, op) in operations.iter().enumerate() {
            let result = op.execute(ctx).await;
            if result.success {
                self.storage
                    .update_operation_state(id, index, OpState::Completed, None)
                    .await?;
            } else {
                let error = result.error_message().to_string();
                tracing::debug!(
                    transaction_id = %id,
                    operation = %op.name(),
                    error = %error,
                    "execution failed, compensating executed operations"
                );
                self.storage
                    .update_operation_state(id, index, OpState::Failed, Some(error))
                    .await?;
                self.transition(id, TxState::Failed).await?;
                return self.compensate_prefix(id, ctx, operations, index).await;
            }
        }

        self.transition(id, TxState::Committed).await?;
        tracing::debug!(transaction_id = %id, "transaction committed");
        Ok(Vec::new())
    }

    /// Compensate operations `[0..failed_index)` in strict reverse order
    async fn compensate_prefix(
        &self,
        id: TransactionId,
        ctx: &TransactionContext,
        operations: &[Arc<dyn SagaOperation>],
        failed_index: usize,
    ) -> Result<Vec<String>> {
        self.transition(id, TxState::Compensating).await?;

        let mut warnings = Vec::new();
        for index in (0..failed_index).rev() {
            let op = &operations[index];
            if let Err(e) = op.compensate(ctx).await {
                tracing::warn!(
                    transaction_id = %id,
                    operation = %op.name(),
                    error = %e,
                    "compensation failed"
                );
                warnings.push(format!("{}: {}", op.name(), e));
            }
        }

        self.transition(id, TxState::Compensated).await?;
        Ok(warnings)
    }
}
