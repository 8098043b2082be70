//! The saga operation trait
//!
//! An operation is the polymorphic unit of work a transaction is composed
//! of: a side-effect-free precondition check, the real mutation through an
//! injected provider, and the compensating inverse of that mutation.

use crate::error::Result;
use async_trait::async_trait;
use bazaar_common::{OperationResult, TransactionContext};

/// A unit of work with a compensating inverse
///
/// The coordinator (and composite operations such as trades) drive the
/// contract strictly: every operation's `validate` must pass before any
/// operation's `execute` runs, and `compensate` is only invoked for
/// operations whose `execute` previously succeeded.
///
/// Implementations take `&self`; an operation that needs private
/// bookkeeping (a composite tracking how many sub-operations have
/// executed) uses interior mutability for it.
#[async_trait]
pub trait SagaOperation: Send + Sync {
    /// Human-readable name, recorded in the transaction log
    fn name(&self) -> String;

    /// Resource keys this operation mutates, used for lock acquisition
    ///
    /// Keys follow the `player:<id>:currency:<code>` /
    /// `player:<id>:inventory:<item>` convention.
    fn lock_keys(&self) -> Vec<String>;

    /// Side-effect-free precondition check
    ///
    /// `Ok(false)` is a business rejection (insufficient balance, missing
    /// item); `Err` is a provider fault.
    async fn validate(&self, ctx: &TransactionContext) -> Result<bool>;

    /// Perform the real mutation via the injected provider
    ///
    /// Business failures come back as `success: false`; provider faults
    /// are folded into a failed result as well, so this never panics and
    /// never returns a transport error to the orchestrator.
    async fn execute(&self, ctx: &TransactionContext) -> OperationResult;

    /// Reverse a previously successful `execute`
    ///
    /// Must tolerate partially mutated external state. Callers treat a
    /// returned error as a warning, never as a propagated failure:
    /// compensation is the last line of defense against inconsistency.
    async fn compensate(&self, ctx: &TransactionContext) -> Result<()>;
}
