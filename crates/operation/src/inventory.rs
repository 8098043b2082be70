//! Inventory grant/remove operation

use crate::error::{OperationError, Result};
use crate::operation::SagaOperation;
use crate::provider::InventoryProvider;
use async_trait::async_trait;
use bazaar_common::{OperationResult, TransactionContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Direction of an inventory mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryOpKind {
    Add,
    Remove,
}

impl InventoryOpKind {
    /// The compensating direction
    pub fn inverse(&self) -> Self {
        match self {
            InventoryOpKind::Add => InventoryOpKind::Remove,
            InventoryOpKind::Remove => InventoryOpKind::Add,
        }
    }
}

impl fmt::Display for InventoryOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryOpKind::Add => write!(f, "add"),
            InventoryOpKind::Remove => write!(f, "remove"),
        }
    }
}

/// Single-player inventory grant or removal with an algebraic inverse
pub struct InventoryOperation {
    kind: InventoryOpKind,
    player_id: String,
    item_id: String,
    quantity: u32,
    reason: String,
    provider: Arc<dyn InventoryProvider>,
}

impl InventoryOperation {
    pub fn new(
        kind: InventoryOpKind,
        player_id: impl Into<String>,
        item_id: impl Into<String>,
        quantity: u32,
        reason: impl Into<String>,
        provider: Arc<dyn InventoryProvider>,
    ) -> Self {
        Self {
            kind,
            player_id: player_id.into(),
            item_id: item_id.into(),
            quantity,
            reason: reason.into(),
            provider,
        }
    }

    async fn apply(
        &self,
        ctx: &TransactionContext,
        kind: InventoryOpKind,
        reason: &str,
    ) -> Result<OperationResult> {
        match kind {
            InventoryOpKind::Add => {
                self.provider
                    .add(ctx, &self.player_id, &self.item_id, self.quantity, reason)
                    .await
            }
            InventoryOpKind::Remove => {
                self.provider
                    .remove(ctx, &self.player_id, &self.item_id, self.quantity, reason)
                    .await
            }
        }
    }
}

#[async_trait]
impl SagaOperation for InventoryOperation {
    fn name(&self) -> String {
        format!(
            "inventory:{}:{}:{}",
            self.kind, self.player_id, self.item_id
        )
    }

    fn lock_keys(&self) -> Vec<String> {
        vec![format!("player:{}:inventory:{}", self.player_id, self.item_id)]
    }

    async fn validate(&self, ctx: &TransactionContext) -> Result<bool> {
        if self.quantity == 0 {
            return Ok(false);
        }
        match self.kind {
            InventoryOpKind::Add => {
                // Respect provider-declared capacity limits, if any
                match self.provider.capacity_remaining(ctx, &self.player_id).await? {
                    Some(remaining) => Ok(remaining >= self.quantity),
                    None => Ok(true),
                }
            }
            InventoryOpKind::Remove => {
                let held = self
                    .provider
                    .get_quantity(ctx, &self.player_id, &self.item_id)
                    .await?;
                Ok(held >= self.quantity)
            }
        }
    }

    async fn execute(&self, ctx: &TransactionContext) -> OperationResult {
        match self.apply(ctx, self.kind, &self.reason).await {
            Ok(result) => result,
            Err(e) => OperationResult::fail("PROVIDER_ERROR", e.to_string()),
        }
    }

    async fn compensate(&self, ctx: &TransactionContext) -> Result<()> {
        let reason = format!("compensate:{}", self.reason);
        let result = self.apply(ctx, self.kind.inverse(), &reason).await?;
        if result.success {
            Ok(())
        } else {
            Err(OperationError::Provider(format!(
                "compensation rejected: {}",
                result.error_message()
            )))
        }
    }
}
