//! Store module
//!
//! Postgres persistence for wallets, recharges, and the outbox. Reads run
//! against the pool; writes that must land together take the caller's
//! transaction so the unit of work decides what commits.

pub mod outbox;
pub mod recharges;
pub mod unit_of_work;
pub mod wallets;

pub use outbox::{OutboxMessage, OutboxStore};
pub use recharges::RechargeStore;
pub use unit_of_work::UnitOfWork;
pub use wallets::WalletStore;

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Check whether a database error is a unique constraint violation.
/// Lets callers treat "someone else inserted first" as its own case.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}
