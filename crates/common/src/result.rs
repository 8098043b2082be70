//! Uniform success/failure envelope returned by operation execution

use serde::{Deserialize, Serialize};

/// Result of an operation's `execute`
///
/// Expected business failures (insufficient funds, item not found) come back
/// as `success: false` with an error message and machine-readable code;
/// they are never surfaced as panics or transport errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Whether the operation succeeded
    pub success: bool,

    /// Operation-specific payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Human-readable error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable error code on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl OperationResult {
    /// Successful result carrying a payload
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    /// Successful result with no payload
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            error_code: None,
        }
    }

    /// Failed result with a code and message
    pub fn fail(error_code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_code: Some(error_code.into()),
        }
    }

    /// Error message, or a placeholder when none was recorded
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}
