//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Recharge not found: {0}")]
    RechargeNotFound(String),

    #[error("Unsupported payment provider: {0}")]
    UnsupportedProvider(String),

    #[error("Webhook signature verification failed")]
    InvalidWebhookSignature,

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // External dependencies
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] crate::gateway::GatewayError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::UnsupportedProvider(name) => {
                (StatusCode::BAD_REQUEST, "unsupported_provider", Some(name.clone()))
            }
            AppError::InvalidWebhookSignature => {
                (StatusCode::BAD_REQUEST, "invalid_webhook_signature", None)
            }

            // 404 Not Found
            AppError::WalletNotFound(id) => {
                (StatusCode::NOT_FOUND, "wallet_not_found", Some(id.clone()))
            }
            AppError::RechargeNotFound(id) => {
                (StatusCode::NOT_FOUND, "recharge_not_found", Some(id.clone()))
            }

            // 409 Conflict
            AppError::VersionConflict => {
                (StatusCode::CONFLICT, "version_conflict", None)
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::InsufficientBalance { .. } => {
                        (StatusCode::BAD_REQUEST, "insufficient_balance", Some(domain_err.to_string()))
                    }
                    DomainError::WalletNotActive => {
                        (StatusCode::BAD_REQUEST, "wallet_not_active", None)
                    }
                    DomainError::InvalidAmount(msg) => {
                        (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                    }
                    DomainError::InvalidReference(msg) => {
                        (StatusCode::BAD_REQUEST, "invalid_reference", Some(msg.clone()))
                    }
                    DomainError::CurrencyMismatch { .. } => {
                        (StatusCode::BAD_REQUEST, "currency_mismatch", Some(domain_err.to_string()))
                    }
                    DomainError::InvalidStateTransition { .. } => {
                        (StatusCode::CONFLICT, "invalid_state_transition", Some(domain_err.to_string()))
                    }
                    DomainError::ReferenceMismatch { .. } => {
                        (StatusCode::CONFLICT, "reference_mismatch", Some(domain_err.to_string()))
                    }
                    DomainError::BusinessRuleViolation(msg) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "business_rule_violation", Some(msg.clone()))
                    }
                }
            }

            // 502 Bad Gateway
            AppError::Gateway(e) => {
                tracing::error!("Payment gateway error: {:?}", e);
                (StatusCode::BAD_GATEWAY, "payment_gateway_error", None)
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
