//! Domain module
//!
//! Core domain types and business logic.

pub mod error;
pub mod events;
pub mod money;

pub use error::DomainError;
pub use events::{routing_key_for, WalletEvent, EVENT_EXCHANGE};
pub use money::{Money, MoneyError, RawMoney};
