//! Integration tests for the crash-recovery sweep

use async_trait::async_trait;
use bazaar_common::{
    OperationResult, OpState, TransactionContext, TransactionId, TransactionLog,
    TransactionMetadata, TxState,
};
use bazaar_coordinator::{Coordinator, CoordinatorConfig, RecoveryOutcome};
use bazaar_operation::testing::MockCurrencyProvider;
use bazaar_operation::{CurrencyOpKind, CurrencyOperation, OperationError, SagaOperation};
use bazaar_storage::{MemoryStorage, Storage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Persist a log that looks like a server crashed mid-execution: the
/// transaction is `executing` with the first operation already completed
async fn save_orphan(storage: &MemoryStorage, server_id: &str) -> TransactionId {
    let id = TransactionId::new();
    let log = TransactionLog::new(
        id,
        ["currency:deduct:alice:gold", "currency:add:bob:gold"],
        Some(TransactionMetadata::for_server(server_id)),
    );
    storage.save_transaction(&log).await.unwrap();
    storage
        .update_transaction_state(id, TxState::Executing)
        .await
        .unwrap();
    storage
        .update_operation_state(id, 0, OpState::Completed, None)
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_orphan_is_compensated_when_operations_can_be_rebuilt() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(
        storage.clone(),
        CoordinatorConfig::new().with_server_id("server-1"),
    );

    // The crashed transaction had deducted alice before dying
    let provider = Arc::new(MockCurrencyProvider::new());
    provider.set_balance("alice", "gold", 400);
    let id = save_orphan(&storage, "server-1").await;

    let rebuild_provider = provider.clone();
    let outcomes = coordinator
        .recover_pending(move |_log| {
            let ops: Vec<Arc<dyn SagaOperation>> = vec![
                Arc::new(CurrencyOperation::new(
                    CurrencyOpKind::Deduct,
                    "alice",
                    "gold",
                    100,
                    "p2p-transfer",
                    rebuild_provider.clone(),
                )),
                Arc::new(CurrencyOperation::new(
                    CurrencyOpKind::Add,
                    "bob",
                    "gold",
                    100,
                    "p2p-transfer",
                    rebuild_provider.clone(),
                )),
            ];
            Some(ops)
        })
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], RecoveryOutcome::Compensated { .. }));
    assert_eq!(outcomes[0].id(), id);

    // The completed deduct was reversed; the never-executed add was not
    assert_eq!(provider.balance("alice", "gold"), 500);
    assert_eq!(provider.balance("bob", "gold"), 0);
    assert_eq!(provider.journal().len(), 1);
    assert!(provider.journal()[0].starts_with("add:alice:gold:100:compensate:"));

    let log = storage.get_transaction(id).await.unwrap().unwrap();
    assert_eq!(log.state, TxState::Compensated);
}

#[tokio::test]
async fn test_orphan_without_rebuild_is_marked_failed() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(
        storage.clone(),
        CoordinatorConfig::new().with_server_id("server-1"),
    );
    let id = save_orphan(&storage, "server-1").await;

    let outcomes = coordinator.recover_pending(|_log| None).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], RecoveryOutcome::MarkedFailed { .. }));

    let log = storage.get_transaction(id).await.unwrap().unwrap();
    assert_eq!(log.state, TxState::Failed);
}

#[tokio::test]
async fn test_sweep_only_touches_own_server() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(
        storage.clone(),
        CoordinatorConfig::new().with_server_id("server-1"),
    );

    let mine = save_orphan(&storage, "server-1").await;
    let theirs = save_orphan(&storage, "server-2").await;

    let outcomes = coordinator.recover_pending(|_log| None).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].id(), mine);

    // The other server's orphan is untouched and still in flight
    let log = storage.get_transaction(theirs).await.unwrap().unwrap();
    assert_eq!(log.state, TxState::Executing);
}

/// Operation that captures the context its compensation ran with
struct CompensationCapture {
    seen: Arc<Mutex<Option<TransactionContext>>>,
}

#[async_trait]
impl SagaOperation for CompensationCapture {
    fn name(&self) -> String {
        "capture".to_string()
    }

    fn lock_keys(&self) -> Vec<String> {
        Vec::new()
    }

    async fn validate(&self, _ctx: &TransactionContext) -> Result<bool, OperationError> {
        Ok(true)
    }

    async fn execute(&self, _ctx: &TransactionContext) -> OperationResult {
        OperationResult::ok_empty()
    }

    async fn compensate(&self, ctx: &TransactionContext) -> Result<(), OperationError> {
        *self.seen.lock() = Some(ctx.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_sweep_metadata_flows_through_to_compensation() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(
        storage.clone(),
        CoordinatorConfig::new().with_server_id("server-1"),
    );
    let id = save_orphan(&storage, "server-1").await;

    let seen = Arc::new(Mutex::new(None));
    let rebuild_seen = seen.clone();
    let mut metadata = HashMap::new();
    metadata.insert("sweep".to_string(), "restart-1".to_string());

    let outcomes = coordinator
        .recover_pending_with_metadata(
            move |_log| {
                let ops: Vec<Arc<dyn SagaOperation>> = vec![Arc::new(CompensationCapture {
                    seen: rebuild_seen.clone(),
                })];
                Some(ops)
            },
            metadata,
        )
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);

    let ctx = seen.lock().clone().unwrap();
    assert_eq!(ctx.transaction_id, id);
    assert_eq!(ctx.server_id.as_deref(), Some("server-1"));
    assert_eq!(ctx.metadata.get("sweep").map(String::as_str), Some("restart-1"));
}

#[tokio::test]
async fn test_sweep_with_nothing_pending_is_a_no_op() {
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(
        storage.clone(),
        CoordinatorConfig::new().with_server_id("server-1"),
    );

    let outcomes = coordinator.recover_pending(|_log| None).await.unwrap();
    assert!(outcomes.is_empty());
}
