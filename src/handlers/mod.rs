//! Command Handlers
//!
//! Each handler orchestrates one state-changing operation: it validates the
//! command, mutates the aggregates, and commits the mutation together with
//! the raised events through a unit of work.

mod commands;
mod complete_recharge_handler;
mod create_wallet_handler;
mod pay_lecture_handler;
mod recharge_handler;
mod wallet_status_handler;


use sqlx::PgPool;

pub use commands::*;
pub use complete_recharge_handler::CompleteRechargeHandler;
pub use create_wallet_handler::CreateWalletHandler;
pub use pay_lecture_handler::PayLectureHandler;
pub use recharge_handler::RechargeWalletHandler;
pub use wallet_status_handler::{DeactivateWalletHandler, ReactivateWalletHandler};

/// Dependencies for one unit of message handling.
///
/// The consumer builds a fresh context per delivery and hands it to the
/// dispatch path, so handlers receive their dependencies explicitly and
/// never reach into shared ambient state.
#[derive(Clone)]
pub struct HandlerContext {
    pub pool: PgPool,
    /// Currency newly created wallets are denominated in
    pub default_currency: String,
}

impl HandlerContext {
    pub fn new(pool: PgPool, default_currency: impl Into<String>) -> Self {
        Self {
            pool,
            default_currency: default_currency.into(),
        }
    }
}
