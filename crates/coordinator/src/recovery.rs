//! Crash-recovery sweep
//!
//! A transaction left `pending` or `executing` in the log means its server
//! crashed before either commit or compensation completed. On restart (or
//! from a periodic external scheduler) the server re-loads its own
//! orphans and forces each through failure and, where possible,
//! compensation.

use crate::coordinator::Coordinator;
use crate::error::Result;
use bazaar_common::{OpState, TransactionContext, TransactionId, TransactionLog, TxState};
use bazaar_operation::SagaOperation;
use bazaar_storage::Storage;
use std::collections::HashMap;
use std::sync::Arc;

/// How one orphaned transaction was settled
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// Operations were rebuilt from the log and every completed one was
    /// compensated in reverse order
    Compensated {
        id: TransactionId,
        compensation_warnings: Vec<String>,
    },

    /// The operation list could not be rebuilt; the log is marked failed
    /// for manual reconciliation against provider-side ledgers
    MarkedFailed { id: TransactionId },
}

impl RecoveryOutcome {
    pub fn id(&self) -> TransactionId {
        match self {
            RecoveryOutcome::Compensated { id, .. } => *id,
            RecoveryOutcome::MarkedFailed { id } => *id,
        }
    }
}

impl<S: Storage> Coordinator<S> {
    /// Settle every in-flight transaction owned by this server
    ///
    /// `rebuild` reconstructs the operation list from a log (typically via
    /// a caller-owned operation registry keyed on record names). An orphan
    /// it cannot rebuild is marked `failed` without compensation.
    ///
    /// The sweep does not re-acquire resource locks: an orphan's locks
    /// either expired with the crashed process or still fence the
    /// resources it touched.
    pub async fn recover_pending<F>(&self, rebuild: F) -> Result<Vec<RecoveryOutcome>>
    where
        F: Fn(&TransactionLog) -> Option<Vec<Arc<dyn SagaOperation>>>,
    {
        self.recover_pending_with_metadata(rebuild, HashMap::new())
            .await
    }

    /// Like [`recover_pending`], with caller-supplied request metadata
    /// carried through the compensation contexts
    ///
    /// [`recover_pending`]: Coordinator::recover_pending
    pub async fn recover_pending_with_metadata<F>(
        &self,
        rebuild: F,
        metadata: HashMap<String, String>,
    ) -> Result<Vec<RecoveryOutcome>>
    where
        F: Fn(&TransactionLog) -> Option<Vec<Arc<dyn SagaOperation>>>,
    {
        let orphans = self
            .storage()
            .get_pending_transactions(self.config().server_id.as_deref())
            .await?;

        let mut outcomes = Vec::with_capacity(orphans.len());
        for log in orphans {
            tracing::info!(
                transaction_id = %log.id,
                state = %log.state,
                "recovering orphaned transaction"
            );
            self.transition(log.id, TxState::Failed).await?;

            match rebuild(&log) {
                Some(operations) => {
                    let ctx = self.context_for(log.id, metadata.clone());
                    let warnings = self.compensate_from_log(&log, &ctx, &operations).await?;
                    outcomes.push(RecoveryOutcome::Compensated {
                        id: log.id,
                        compensation_warnings: warnings,
                    });
                }
                None => {
                    tracing::warn!(
                        transaction_id = %log.id,
                        "could not rebuild operations, marked failed for manual reconciliation"
                    );
                    outcomes.push(RecoveryOutcome::MarkedFailed { id: log.id });
                }
            }
        }
        Ok(outcomes)
    }

    /// Compensate every operation the log records as completed, highest
    /// index first
    async fn compensate_from_log(
        &self,
        log: &TransactionLog,
        ctx: &TransactionContext,
        operations: &[Arc<dyn SagaOperation>],
    ) -> Result<Vec<String>> {
        self.transition(log.id, TxState::Compensating).await?;

        let mut warnings = Vec::new();
        for index in (0..log.operations.len().min(operations.len())).rev() {
            if log.operations[index].state != OpState::Completed {
                continue;
            }
            let op = &operations[index];
            if let Err(e) = op.compensate(ctx).await {
                tracing::warn!(
                    transaction_id = %log.id,
                    operation = %op.name(),
                    error = %e,
                    "recovery compensation failed"
                );
                warnings.push(format!("{}: {}", op.name(), e));
            }
        }

        self.transition(log.id, TxState::Compensated).await?;
        Ok(warnings)
    }
}
