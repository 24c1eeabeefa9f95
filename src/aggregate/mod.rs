//! Aggregate module
//!
//! Aggregate Root pattern implementation. Aggregates mutate in memory and
//! hand back the events describing the change; persistence happens in the
//! stores.

pub mod recharge;
pub mod wallet;

pub use recharge::{PaymentProvider, RechargeStatus, WalletRecharge};
pub use wallet::{TransactionSource, TransactionType, Wallet, WalletLedgerEntry};

/// Aggregate trait that all aggregates must implement
pub trait Aggregate {
    /// Get the aggregate type name (for logging and storage)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> uuid::Uuid;
}
