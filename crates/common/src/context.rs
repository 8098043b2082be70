//! Request-scoped transaction context
//!
//! Built by the invoking RPC handler and passed through operations to
//! providers, so provider-side ledgers can attribute and dedup mutations.

use crate::transaction_id::TransactionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque request-scoped metadata flowing through a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionContext {
    /// Id of the transaction this context belongs to
    pub transaction_id: TransactionId,

    /// Server executing the transaction, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,

    /// Tracing/audit metadata passed through to providers verbatim
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl TransactionContext {
    /// Context for a transaction with no metadata
    pub fn new(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id,
            server_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the executing server id
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
