//! Composite two-party trade operation
//!
//! A trade is an orchestrator over currency and inventory sub-operations,
//! not a leaf. The sub-operation list is built once at construction: for
//! every item or currency a party gives, a `(remove from giver, add to
//! receiver)` pair is emitted, party A's gives first, then party B's.
//! Because every give is immediately followed by the matching receive, and
//! any break in the chain unwinds everything executed so far in reverse,
//! no trade can leave one party debited without the counterpart credited.

use crate::currency::{CurrencyOpKind, CurrencyOperation};
use crate::error::Result;
use crate::inventory::{InventoryOpKind, InventoryOperation};
use crate::operation::SagaOperation;
use crate::provider::{CurrencyProvider, InventoryProvider};
use async_trait::async_trait;
use bazaar_common::{OperationResult, TransactionContext};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An item stack one party puts into a trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeItem {
    pub item_id: String,
    pub quantity: u32,
}

/// A currency amount one party puts into a trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeCurrency {
    pub currency: String,
    pub amount: i64,
}

/// One side of a two-party exchange; pure value data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeParty {
    pub player_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TradeItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub currencies: Vec<TradeCurrency>,
}

impl TradeParty {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            items: Vec::new(),
            currencies: Vec::new(),
        }
    }

    /// Add an item stack this party gives away
    pub fn gives_item(mut self, item_id: impl Into<String>, quantity: u32) -> Self {
        self.items.push(TradeItem {
            item_id: item_id.into(),
            quantity,
        });
        self
    }

    /// Add a currency amount this party gives away
    pub fn gives_currency(mut self, currency: impl Into<String>, amount: i64) -> Self {
        self.currencies.push(TradeCurrency {
            currency: currency.into(),
            amount,
        });
        self
    }
}

/// Composite operation exchanging items and currencies between two players
pub struct TradeOperation {
    trade_id: String,
    sub_operations: Vec<Box<dyn SagaOperation>>,

    /// How many sub-operations have executed successfully; consulted only
    /// by compensation, never persisted
    executed: Mutex<usize>,
}

impl TradeOperation {
    pub fn new(
        trade_id: impl Into<String>,
        party_a: TradeParty,
        party_b: TradeParty,
        reason: impl Into<String>,
        currency_provider: Arc<dyn CurrencyProvider>,
        inventory_provider: Arc<dyn InventoryProvider>,
    ) -> Self {
        let trade_id = trade_id.into();
        let reason = format!("trade:{}:{}", trade_id, reason.into());

        let mut sub_operations: Vec<Box<dyn SagaOperation>> = Vec::new();
        for (giver, receiver) in [(&party_a, &party_b), (&party_b, &party_a)] {
            Self::push_transfers(
                &mut sub_operations,
                giver,
                receiver,
                &reason,
                &currency_provider,
                &inventory_provider,
            );
        }

        Self {
            trade_id,
            sub_operations,
            executed: Mutex::new(0),
        }
    }

    /// Emit the give/receive pairs for everything `giver` hands over
    fn push_transfers(
        out: &mut Vec<Box<dyn SagaOperation>>,
        giver: &TradeParty,
        receiver: &TradeParty,
        reason: &str,
        currency_provider: &Arc<dyn CurrencyProvider>,
        inventory_provider: &Arc<dyn InventoryProvider>,
    ) {
        for item in &giver.items {
            out.push(Box::new(InventoryOperation::new(
                InventoryOpKind::Remove,
                &giver.player_id,
                &item.item_id,
                item.quantity,
                reason,
                inventory_provider.clone(),
            )));
            out.push(Box::new(InventoryOperation::new(
                InventoryOpKind::Add,
                &receiver.player_id,
                &item.item_id,
                item.quantity,
                reason,
                inventory_provider.clone(),
            )));
        }
        for currency in &giver.currencies {
            out.push(Box::new(CurrencyOperation::new(
                CurrencyOpKind::Deduct,
                &giver.player_id,
                &currency.currency,
                currency.amount,
                reason,
                currency_provider.clone(),
            )));
            out.push(Box::new(CurrencyOperation::new(
                CurrencyOpKind::Add,
                &receiver.player_id,
                &currency.currency,
                currency.amount,
                reason,
                currency_provider.clone(),
            )));
        }
    }

    /// Number of sub-operations in the built exchange
    pub fn sub_operation_count(&self) -> usize {
        self.sub_operations.len()
    }

    /// Compensate every executed sub-operation in strict reverse order
    ///
    /// Compensation errors are logged and swallowed: the unwind keeps
    /// going so as much state as possible is restored.
    async fn unwind(&self, ctx: &TransactionContext) {
        let executed = *self.executed.lock();
        for index in (0..executed).rev() {
            let sub = &self.sub_operations[index];
            if let Err(e) = sub.compensate(ctx).await {
                tracing::warn!(
                    trade_id = %self.trade_id,
                    sub_operation = %sub.name(),
                    error = %e,
                    "trade sub-operation compensation failed"
                );
            }
        }
        *self.executed.lock() = 0;
    }
}

#[async_trait]
impl SagaOperation for TradeOperation {
    fn name(&self) -> String {
        format!("trade:{}", self.trade_id)
    }

    fn lock_keys(&self) -> Vec<String> {
        // Union of sub-operation keys, first-seen order
        let mut keys = Vec::new();
        for sub in &self.sub_operations {
            for key in sub.lock_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    async fn validate(&self, ctx: &TransactionContext) -> Result<bool> {
        for sub in &self.sub_operations {
            if !sub.validate(ctx).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn execute(&self, ctx: &TransactionContext) -> OperationResult {
        for sub in &self.sub_operations {
            let result = sub.execute(ctx).await;
            if result.success {
                *self.executed.lock() += 1;
            } else {
                tracing::debug!(
                    trade_id = %self.trade_id,
                    sub_operation = %sub.name(),
                    "trade sub-operation failed, unwinding"
                );
                self.unwind(ctx).await;
                return OperationResult::fail(
                    result
                        .error_code
                        .clone()
                        .unwrap_or_else(|| "TRADE_FAILED".to_string()),
                    format!("{} failed: {}", sub.name(), result.error_message()),
                );
            }
        }

        OperationResult::ok(serde_json::json!({
            "tradeId": self.trade_id,
            "operations": self.sub_operations.len(),
        }))
    }

    async fn compensate(&self, ctx: &TransactionContext) -> Result<()> {
        self.unwind(ctx).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCurrencyProvider, MockInventoryProvider};
    use bazaar_common::TransactionId;

    fn ctx() -> TransactionContext {
        TransactionContext::new(TransactionId::new())
    }

    fn item_for_gold_trade(
        currency: &Arc<MockCurrencyProvider>,
        inventory: &Arc<MockInventoryProvider>,
    ) -> TradeOperation {
        TradeOperation::new(
            "trade-1",
            TradeParty::new("alice").gives_item("sword", 1),
            TradeParty::new("bob").gives_currency("gold", 100),
            "auction",
            currency.clone() as Arc<dyn CurrencyProvider>,
            inventory.clone() as Arc<dyn InventoryProvider>,
        )
    }

    #[tokio::test]
    async fn test_successful_trade_moves_both_sides() {
        let currency = Arc::new(MockCurrencyProvider::new());
        let inventory = Arc::new(MockInventoryProvider::new());
        inventory.set_quantity("alice", "sword", 1);
        currency.set_balance("bob", "gold", 100);

        let trade = item_for_gold_trade(&currency, &inventory);
        assert_eq!(trade.sub_operation_count(), 4);
        assert!(trade.validate(&ctx()).await.unwrap());

        let result = trade.execute(&ctx()).await;
        assert!(result.success);

        // Exactly one -1 sword on A, +1 on B, -100 gold on B, +100 on A
        assert_eq!(inventory.quantity("alice", "sword"), 0);
        assert_eq!(inventory.quantity("bob", "sword"), 1);
        assert_eq!(currency.balance("bob", "gold"), 0);
        assert_eq!(currency.balance("alice", "gold"), 100);
        assert_eq!(inventory.journal().len(), 2);
        assert_eq!(currency.journal().len(), 2);
    }

    #[tokio::test]
    async fn test_validate_short_circuits_without_movement() {
        let currency = Arc::new(MockCurrencyProvider::new());
        let inventory = Arc::new(MockInventoryProvider::new());
        // Alice does not own the sword she is offering
        currency.set_balance("bob", "gold", 100);

        let trade = item_for_gold_trade(&currency, &inventory);
        assert!(!trade.validate(&ctx()).await.unwrap());

        // Zero currency or item movement occurred
        assert!(currency.journal().is_empty());
        assert!(inventory.journal().is_empty());
    }

    #[tokio::test]
    async fn test_mid_trade_failure_unwinds_in_reverse() {
        let currency = Arc::new(MockCurrencyProvider::new());
        let inventory = Arc::new(MockInventoryProvider::new());
        inventory.set_quantity("alice", "sword", 1);
        // Bob cannot actually pay, so the third sub-operation fails at
        // execute time even though a stale validate might have passed
        currency.set_balance("bob", "gold", 0);

        let trade = item_for_gold_trade(&currency, &inventory);
        let result = trade.execute(&ctx()).await;
        assert!(!result.success);

        // Both item moves were compensated, newest first
        assert_eq!(inventory.quantity("alice", "sword"), 1);
        assert_eq!(inventory.quantity("bob", "sword"), 0);
        assert_eq!(currency.balance("bob", "gold"), 0);
        assert_eq!(currency.balance("alice", "gold"), 0);

        let journal = inventory.journal();
        assert_eq!(journal.len(), 4);
        assert!(journal[0].starts_with("remove:alice:sword:1"));
        assert!(journal[1].starts_with("add:bob:sword:1"));
        // Reverse order: bob's add undone before alice's remove
        assert!(journal[2].starts_with("remove:bob:sword:1:compensate:"));
        assert!(journal[3].starts_with("add:alice:sword:1:compensate:"));
    }

    #[tokio::test]
    async fn test_whole_trade_compensation_after_success() {
        let currency = Arc::new(MockCurrencyProvider::new());
        let inventory = Arc::new(MockInventoryProvider::new());
        inventory.set_quantity("alice", "sword", 1);
        currency.set_balance("bob", "gold", 100);

        let trade = item_for_gold_trade(&currency, &inventory);
        assert!(trade.execute(&ctx()).await.success);

        // A later top-level failure makes the coordinator reverse the
        // whole committed trade
        trade.compensate(&ctx()).await.unwrap();

        assert_eq!(inventory.quantity("alice", "sword"), 1);
        assert_eq!(inventory.quantity("bob", "sword"), 0);
        assert_eq!(currency.balance("bob", "gold"), 100);
        assert_eq!(currency.balance("alice", "gold"), 0);
    }

    #[tokio::test]
    async fn test_lock_keys_cover_both_parties() {
        let currency = Arc::new(MockCurrencyProvider::new());
        let inventory = Arc::new(MockInventoryProvider::new());
        let trade = item_for_gold_trade(&currency, &inventory);

        let keys = trade.lock_keys();
        assert_eq!(
            keys,
            vec![
                "player:alice:inventory:sword".to_string(),
                "player:bob:inventory:sword".to_string(),
                "player:bob:currency:gold".to_string(),
                "player:alice:currency:gold".to_string(),
            ]
        );
    }
}
