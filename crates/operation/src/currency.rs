//! Currency credit/debit operation

use crate::error::{OperationError, Result};
use crate::operation::SagaOperation;
use crate::provider::CurrencyProvider;
use async_trait::async_trait;
use bazaar_common::{OperationResult, TransactionContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Direction of a currency mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyOpKind {
    Add,
    Deduct,
}

impl CurrencyOpKind {
    /// The compensating direction
    pub fn inverse(&self) -> Self {
        match self {
            CurrencyOpKind::Add => CurrencyOpKind::Deduct,
            CurrencyOpKind::Deduct => CurrencyOpKind::Add,
        }
    }
}

impl fmt::Display for CurrencyOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyOpKind::Add => write!(f, "add"),
            CurrencyOpKind::Deduct => write!(f, "deduct"),
        }
    }
}

/// Single-player currency credit or debit with an algebraic inverse
pub struct CurrencyOperation {
    kind: CurrencyOpKind,
    player_id: String,
    currency: String,
    amount: i64,
    reason: String,
    provider: Arc<dyn CurrencyProvider>,
}

impl CurrencyOperation {
    pub fn new(
        kind: CurrencyOpKind,
        player_id: impl Into<String>,
        currency: impl Into<String>,
        amount: i64,
        reason: impl Into<String>,
        provider: Arc<dyn CurrencyProvider>,
    ) -> Self {
        Self {
            kind,
            player_id: player_id.into(),
            currency: currency.into(),
            amount,
            reason: reason.into(),
            provider,
        }
    }

    fn compensation_reason(&self) -> String {
        // Derived from the forward reason so provider-side ledgers can
        // dedup and reconcile the reversal against the original entry
        format!("compensate:{}", self.reason)
    }

    async fn apply(
        &self,
        ctx: &TransactionContext,
        kind: CurrencyOpKind,
        reason: &str,
    ) -> Result<OperationResult> {
        match kind {
            CurrencyOpKind::Add => {
                self.provider
                    .add(ctx, &self.player_id, &self.currency, self.amount, reason)
                    .await
            }
            CurrencyOpKind::Deduct => {
                self.provider
                    .deduct(ctx, &self.player_id, &self.currency, self.amount, reason)
                    .await
            }
        }
    }
}

#[async_trait]
impl SagaOperation for CurrencyOperation {
    fn name(&self) -> String {
        format!(
            "currency:{}:{}:{}",
            self.kind, self.player_id, self.currency
        )
    }

    fn lock_keys(&self) -> Vec<String> {
        vec![format!("player:{}:currency:{}", self.player_id, self.currency)]
    }

    async fn validate(&self, ctx: &TransactionContext) -> Result<bool> {
        if self.amount <= 0 {
            return Ok(false);
        }
        match self.kind {
            CurrencyOpKind::Add => Ok(true),
            CurrencyOpKind::Deduct => {
                let balance = self
                    .provider
                    .get_balance(ctx, &self.player_id, &self.currency)
                    .await?;
                Ok(balance >= self.amount)
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
        let reason = self.compensation_reason();
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
