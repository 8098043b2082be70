//! Operation layer of the Bazaar saga engine
//!
//! Defines the [`SagaOperation`] abstraction (validate / execute /
//! compensate), the provider contracts through which operations touch the
//! real economic state, and the concrete operations: currency, inventory,
//! and the composite two-party trade.

mod currency;
mod error;
mod inventory;
mod operation;
mod provider;
mod trade;

pub mod testing;

pub use currency::{CurrencyOpKind, CurrencyOperation};
pub use error::{OperationError, Result};
pub use inventory::{InventoryOpKind, InventoryOperation};
pub use operation::SagaOperation;
pub use provider::{CurrencyProvider, InventoryProvider};
pub use trade::{TradeCurrency, TradeItem, TradeOperation, TradeParty};
