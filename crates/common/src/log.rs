//! Durable transaction log records
//!
//! The serialized JSON shape of these types (camelCase field names,
//! lowercase state strings, epoch-millisecond timestamps) is the contract
//! any alternative storage backend must honor.

use crate::state::{OpState, TxState};
use crate::transaction_id::TransactionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Per-operation record within a transaction log, addressed by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Human-readable operation name
    pub name: String,

    /// Current operation state
    pub state: OpState,

    /// Error message if the operation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationRecord {
    /// Create a pending record for a named operation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: OpState::Pending,
            error: None,
        }
    }
}

/// Deployment metadata attached to a transaction log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    /// Server that owns this transaction, used to scope recovery sweeps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,

    /// Any further deployment-specific fields, preserved verbatim
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TransactionMetadata {
    /// Metadata scoped to a server id
    pub fn for_server(server_id: impl Into<String>) -> Self {
        Self {
            server_id: Some(server_id.into()),
            extra: HashMap::new(),
        }
    }
}

/// Durable record of a transaction and its per-operation states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLog {
    /// Globally unique, immutable transaction id
    pub id: TransactionId,

    /// Transaction lifecycle state
    pub state: TxState,

    /// Positional operation records, order fixed at creation
    pub operations: Vec<OperationRecord>,

    /// Creation time, epoch milliseconds
    pub created_at: i64,

    /// Last state-change time, epoch milliseconds
    pub updated_at: i64,

    /// Optional deployment metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TransactionMetadata>,
}

impl TransactionLog {
    /// Create a fresh pending log with one pending record per operation name
    pub fn new<I, N>(id: TransactionId, operation_names: I, metadata: Option<TransactionMetadata>) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let now = now_millis();
        Self {
            id,
            state: TxState::Pending,
            operations: operation_names.into_iter().map(OperationRecord::new).collect(),
            created_at: now,
            updated_at: now,
            metadata,
        }
    }

    /// Server id from metadata, if any
    pub fn server_id(&self) -> Option<&str> {
        self.metadata.as_ref()?.server_id.as_deref()
    }

    /// Whether every operation record reached `completed`
    pub fn all_operations_completed(&self) -> bool {
        self.operations.iter().all(|op| op.state == OpState::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_json_shape() {
        let id = TransactionId::new();
        let mut log = TransactionLog::new(
            id,
            ["currency:deduct", "currency:add"],
            Some(TransactionMetadata::for_server("server-1")),
        );
        log.operations[0].state = OpState::Failed;
        log.operations[0].error = Some("insufficient funds".to_string());

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["id"], serde_json::json!(id.to_string()));
        assert_eq!(json["state"], "pending");
        assert_eq!(json["operations"][0]["name"], "currency:deduct");
        assert_eq!(json["operations"][0]["state"], "failed");
        assert_eq!(json["operations"][0]["error"], "insufficient funds");
        assert_eq!(json["operations"][1]["state"], "pending");
        assert!(json["operations"][1].get("error").is_none());
        assert_eq!(json["metadata"]["serverId"], "server-1");
        assert!(json["createdAt"].is_i64());
        assert!(json["updatedAt"].is_i64());
    }

    #[test]
    fn test_log_json_roundtrip() {
        let log = TransactionLog::new(TransactionId::new(), ["trade"], None);
        let bytes = serde_json::to_vec(&log).unwrap();
        let back: TransactionLog = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(log, back);
    }

    #[test]
    fn test_all_operations_completed() {
        let mut log = TransactionLog::new(TransactionId::new(), ["a", "b"], None);
        assert!(!log.all_operations_completed());
        for op in &mut log.operations {
            op.state = OpState::Completed;
        }
        assert!(log.all_operations_completed());
    }
}
