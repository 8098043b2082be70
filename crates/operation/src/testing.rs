//! Mock providers for tests
//!
//! In-memory currency and inventory providers that record every successful
//! mutation in an ordered journal, so tests can assert exactly what moved
//! and in what order. Both can be scripted to fail with a provider fault
//! when a mutation's reason contains a given substring, which is how
//! compensation-failure paths are exercised.

use crate::error::{OperationError, Result};
use crate::provider::{CurrencyProvider, InventoryProvider};
use async_trait::async_trait;
use bazaar_common::{OperationResult, TransactionContext};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory currency ledger
#[derive(Default)]
pub struct MockCurrencyProvider {
    balances: Mutex<HashMap<(String, String), i64>>,
    journal: Mutex<Vec<String>>,
    fail_on_reason: Mutex<Option<String>>,
}

impl MockCurrencyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, player_id: &str, currency: &str, amount: i64) {
        self.balances
            .lock()
            .insert((player_id.to_string(), currency.to_string()), amount);
    }

    pub fn balance(&self, player_id: &str, currency: &str) -> i64 {
        self.balances
            .lock()
            .get(&(player_id.to_string(), currency.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Ordered record of successful mutations, `op:player:currency:amount:reason`
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Fail any mutation whose reason contains `needle` with a provider fault
    pub fn fail_on_reason_containing(&self, needle: &str) {
        *self.fail_on_reason.lock() = Some(needle.to_string());
    }

    fn check_fault(&self, reason: &str) -> Result<()> {
        if let Some(needle) = self.fail_on_reason.lock().as_deref() {
            if reason.contains(needle) {
                return Err(OperationError::Provider("currency provider offline".into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CurrencyProvider for MockCurrencyProvider {
    async fn get_balance(
        &self,
        _ctx: &TransactionContext,
        player_id: &str,
        currency: &str,
    ) -> Result<i64> {
        Ok(self.balance(player_id, currency))
    }

    async fn add(
        &self,
        _ctx: &TransactionContext,
        player_id: &str,
        currency: &str,
        amount: i64,
        reason: &str,
    ) -> Result<OperationResult> {
        self.check_fault(reason)?;
        let mut balances = self.balances.lock();
        let entry = balances
            .entry((player_id.to_string(), currency.to_string()))
            .or_insert(0);
        *entry += amount;
        let balance = *entry;
        drop(balances);

        self.journal
            .lock()
            .push(format!("add:{}:{}:{}:{}", player_id, currency, amount, reason));
        Ok(OperationResult::ok(serde_json::json!({ "balance": balance })))
    }

    async fn deduct(
        &self,
        _ctx: &TransactionContext,
        player_id: &str,
        currency: &str,
        amount: i64,
        reason: &str,
    ) -> Result<OperationResult> {
        self.check_fault(reason)?;
        let mut balances = self.balances.lock();
        let entry = balances
            .entry((player_id.to_string(), currency.to_string()))
            .or_insert(0);
        if *entry < amount {
            return Ok(OperationResult::fail(
                "INSUFFICIENT_FUNDS",
                format!("{} has {} {}, needs {}", player_id, entry, currency, amount),
            ));
        }
        *entry -= amount;
        let balance = *entry;
        drop(balances);

        self.journal.lock().push(format!(
            "deduct:{}:{}:{}:{}",
            player_id, currency, amount, reason
        ));
        Ok(OperationResult::ok(serde_json::json!({ "balance": balance })))
    }
}

/// In-memory inventory store
#[derive(Default)]
pub struct MockInventoryProvider {
    quantities: Mutex<HashMap<(String, String), u32>>,
    capacities: Mutex<HashMap<String, u32>>,
    journal: Mutex<Vec<String>>,
    fail_on_reason: Mutex<Option<String>>,
}

impl MockInventoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quantity(&self, player_id: &str, item_id: &str, quantity: u32) {
        self.quantities
            .lock()
            .insert((player_id.to_string(), item_id.to_string()), quantity);
    }

    pub fn quantity(&self, player_id: &str, item_id: &str) -> u32 {
        self.quantities
            .lock()
            .get(&(player_id.to_string(), item_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Declare remaining capacity for a player; unset players are unbounded
    pub fn set_capacity(&self, player_id: &str, remaining: u32) {
        self.capacities.lock().insert(player_id.to_string(), remaining);
    }

    /// Ordered record of successful mutations, `op:player:item:quantity:reason`
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Fail any mutation whose reason contains `needle` with a provider fault
    pub fn fail_on_reason_containing(&self, needle: &str) {
        *self.fail_on_reason.lock() = Some(needle.to_string());
    }

    fn check_fault(&self, reason: &str) -> Result<()> {
        if let Some(needle) = self.fail_on_reason.lock().as_deref() {
            if reason.contains(needle) {
                return Err(OperationError::Provider("inventory provider offline".into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryProvider for MockInventoryProvider {
    async fn get_quantity(
        &self,
        _ctx: &TransactionContext,
        player_id: &str,
        item_id: &str,
    ) -> Result<u32> {
        Ok(self.quantity(player_id, item_id))
    }

    async fn capacity_remaining(
        &self,
        _ctx: &TransactionContext,
        player_id: &str,
    ) -> Result<Option<u32>> {
        Ok(self.capacities.lock().get(player_id).copied())
    }

    async fn add(
        &self,
        _ctx: &TransactionContext,
        player_id: &str,
        item_id: &str,
        quantity: u32,
        reason: &str,
    ) -> Result<OperationResult> {
        self.check_fault(reason)?;
        if let Some(remaining) = self.capacities.lock().get(player_id).copied() {
            if quantity > remaining {
                return Ok(OperationResult::fail(
                    "CAPACITY_EXCEEDED",
                    format!("{} cannot hold {} more {}", player_id, quantity, item_id),
                ));
            }
        }
        let mut quantities = self.quantities.lock();
        let entry = quantities
            .entry((player_id.to_string(), item_id.to_string()))
            .or_insert(0);
        *entry += quantity;
        drop(quantities);

        self.journal.lock().push(format!(
            "add:{}:{}:{}:{}",
            player_id, item_id, quantity, reason
        ));
        Ok(OperationResult::ok_empty())
    }

    async fn remove(
        &self,
        _ctx: &TransactionContext,
        player_id: &str,
        item_id: &str,
        quantity: u32,
        reason: &str,
    ) -> Result<OperationResult> {
        self.check_fault(reason)?;
        let mut quantities = self.quantities.lock();
        let entry = quantities
            .entry((player_id.to_string(), item_id.to_string()))
            .or_insert(0);
        if *entry < quantity {
            return Ok(OperationResult::fail(
                "INSUFFICIENT_QUANTITY",
                format!("{} has {} {}, needs {}", player_id, entry, item_id, quantity),
            ));
        }
        *entry -= quantity;
        drop(quantities);

        self.journal.lock().push(format!(
            "remove:{}:{}:{}:{}",
            player_id, item_id, quantity, reason
        ));
        Ok(OperationResult::ok_empty())
    }
}
