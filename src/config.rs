//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Currency wallets are opened in
    pub default_currency: String,

    /// How many outbox rows the relay drains per pass
    pub outbox_batch_size: i64,

    /// Seconds between relay passes
    pub outbox_poll_interval_secs: u64,

    /// Endpoint secret for Stripe webhook signatures
    pub stripe_webhook_secret: String,

    /// Base URL students are redirected to for PayPal approval
    pub paypal_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let default_currency = env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "EGP".to_string());

        let outbox_batch_size = env::var("OUTBOX_BATCH_SIZE")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_BATCH_SIZE"))?;

        let outbox_poll_interval_secs = env::var("OUTBOX_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_POLL_INTERVAL_SECS"))?;

        let stripe_webhook_secret =
            env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| "whsec_test".to_string());

        let paypal_base_url = env::var("PAYPAL_BASE_URL")
            .unwrap_or_else(|_| "https://www.sandbox.paypal.com".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            default_currency,
            outbox_batch_size,
            outbox_poll_interval_secs,
            stripe_webhook_secret,
            paypal_base_url,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
