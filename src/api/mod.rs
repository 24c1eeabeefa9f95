//! API module
//!
//! HTTP endpoints for wallet queries, recharges, lecture purchases and
//! provider webhooks.

pub mod routes;

pub use routes::{create_router, AppState};
