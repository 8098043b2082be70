//! Provider contracts for the external economic systems
//!
//! Providers are the real currency ledger and inventory store, injected
//! into operations at construction. The transaction context flows through
//! so provider-side ledgers can attribute and dedup mutations by
//! transaction id and reason.

use crate::error::Result;
use async_trait::async_trait;
use bazaar_common::{OperationResult, TransactionContext};

/// External currency ledger
#[async_trait]
pub trait CurrencyProvider: Send + Sync {
    /// Current balance of `currency` for a player
    async fn get_balance(
        &self,
        ctx: &TransactionContext,
        player_id: &str,
        currency: &str,
    ) -> Result<i64>;

    /// Credit a player's balance
    async fn add(
        &self,
        ctx: &TransactionContext,
        player_id: &str,
        currency: &str,
        amount: i64,
        reason: &str,
    ) -> Result<OperationResult>;

    /// Debit a player's balance
    async fn deduct(
        &self,
        ctx: &TransactionContext,
        player_id: &str,
        currency: &str,
        amount: i64,
        reason: &str,
    ) -> Result<OperationResult>;
}

/// External inventory store
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Quantity of `item_id` a player currently holds
    async fn get_quantity(
        &self,
        ctx: &TransactionContext,
        player_id: &str,
        item_id: &str,
    ) -> Result<u32>;

    /// Remaining capacity for new items, `None` if the store is unbounded
    async fn capacity_remaining(
        &self,
        ctx: &TransactionContext,
        player_id: &str,
    ) -> Result<Option<u32>>;

    /// Grant items to a player
    async fn add(
        &self,
        ctx: &TransactionContext,
        player_id: &str,
        item_id: &str,
        quantity: u32,
        reason: &str,
    ) -> Result<OperationResult>;

    /// Take items from a player
    async fn remove(
        &self,
        ctx: &TransactionContext,
        player_id: &str,
        item_id: &str,
        quantity: u32,
        reason: &str,
    ) -> Result<OperationResult>;
}
