//! student-wallet Library
//!
//! Re-exports modules for integration testing and external use.

pub mod aggregate;
pub mod api;
pub mod domain;
pub mod gateway;
pub mod handlers;
pub mod jobs;
pub mod messaging;
pub mod store;

// Private modules (used only by main.rs binary)
pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{DomainError, Money, MoneyError, WalletEvent};
