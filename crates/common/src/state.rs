//! Transaction and operation state machines
//!
//! State strings are part of the durable log contract and must match
//! across implementations, hence the lowercase serde renames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction lifecycle state
///
/// `pending → executing → {committed | failed}`; a failed transaction may
/// continue `failed → compensating → compensated`. `committed` and
/// `compensated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    /// Created and logged, no locks or mutations yet
    Pending,
    /// Locks held, operations validating or executing
    Executing,
    /// All operations completed; terminal
    Committed,
    /// Validation or execution failed
    Failed,
    /// Compensation of executed operations is under way
    Compensating,
    /// Compensation finished (best-effort); terminal
    Compensated,
}

impl TxState {
    /// Whether no further state transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Committed | TxState::Compensated)
    }

    /// Whether a crashed server would need to recover this transaction
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TxState::Pending | TxState::Executing)
    }

    /// Check whether a transition to `next` is legal
    pub fn can_transition_to(&self, next: TxState) -> bool {
        use TxState::*;
        matches!(
            (*self, next),
            (Pending, Executing)
                | (Pending, Failed)
                | (Executing, Committed)
                | (Executing, Failed)
                | (Failed, Compensating)
                | (Compensating, Compensated)
        )
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxState::Pending => "pending",
            TxState::Executing => "executing",
            TxState::Committed => "committed",
            TxState::Failed => "failed",
            TxState::Compensating => "compensating",
            TxState::Compensated => "compensated",
        };
        write!(f, "{}", s)
    }
}

/// Per-operation state within a transaction
///
/// Monotonic: a completed operation's record is never rewritten back to
/// pending. Compensation is tracked at the transaction level instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpState {
    /// Not yet executed
    Pending,
    /// Execute succeeded
    Completed,
    /// Execute reported failure or threw
    Failed,
}

impl fmt::Display for OpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpState::Pending => "pending",
            OpState::Completed => "completed",
            OpState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_strings_match_contract() {
        assert_eq!(serde_json::to_string(&TxState::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&TxState::Executing).unwrap(), "\"executing\"");
        assert_eq!(serde_json::to_string(&TxState::Committed).unwrap(), "\"committed\"");
        assert_eq!(serde_json::to_string(&TxState::Failed).unwrap(), "\"failed\"");
        assert_eq!(
            serde_json::to_string(&TxState::Compensated).unwrap(),
            "\"compensated\""
        );
        assert_eq!(serde_json::to_string(&OpState::Completed).unwrap(), "\"completed\"");
    }

    #[test]
    fn test_legal_transitions() {
        assert!(TxState::Pending.can_transition_to(TxState::Executing));
        assert!(TxState::Executing.can_transition_to(TxState::Committed));
        assert!(TxState::Executing.can_transition_to(TxState::Failed));
        assert!(TxState::Failed.can_transition_to(TxState::Compensating));
        assert!(TxState::Compensating.can_transition_to(TxState::Compensated));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!TxState::Committed.can_transition_to(TxState::Failed));
        assert!(!TxState::Compensated.can_transition_to(TxState::Executing));
        assert!(!TxState::Pending.can_transition_to(TxState::Committed));
    }

    #[test]
    fn test_in_flight_states() {
        assert!(TxState::Pending.is_in_flight());
        assert!(TxState::Executing.is_in_flight());
        assert!(!TxState::Failed.is_in_flight());
        assert!(!TxState::Committed.is_in_flight());
    }
}
