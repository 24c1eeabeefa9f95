//! Payment gateway module
//!
//! Ports and adapters for the external payment providers that settle
//! recharges. Handlers talk to the `PaymentGateway` trait; the registry
//! picks the adapter for a provider tag.

pub mod paypal;
pub mod stripe;

pub use paypal::PayPalGateway;
pub use stripe::StripeGateway;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::aggregate::{PaymentProvider, RechargeStatus};
use crate::config::Config;
use crate::domain::Money;
use crate::error::AppError;

/// Errors from the provider-facing side of a gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    #[error("Provider returned no client payment token")]
    MissingToken,
}

/// Request to open a checkout session for a pending recharge
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub wallet_id: Uuid,
    pub recharge_id: Uuid,
    pub amount: Money,
    pub callback_url: String,
}

/// Checkout session handed back by a provider
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub provider_reference_id: String,
    pub client_payment_token: Option<String>,
}

/// Provider notification after authenticity checks and mapping
#[derive(Debug, Clone)]
pub struct WebhookNotification {
    pub is_valid: bool,
    pub provider_reference_id: String,
    pub status: RechargeStatus,
    pub amount: Option<Decimal>,
}

impl WebhookNotification {
    /// Notification that failed the authenticity check
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            provider_reference_id: String::new(),
            status: RechargeStatus::Pending,
            amount: None,
        }
    }
}

/// Port every payment provider adapter implements
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Which provider this gateway talks to
    fn provider(&self) -> PaymentProvider;

    /// Open a checkout session the client can pay against
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Cancel a previously opened session
    async fn cancel_session(&self, provider_reference_id: &str) -> Result<(), GatewayError>;

    /// Authenticate and interpret a provider notification.
    /// A forged or unreadable notification yields an invalid result, never
    /// an error; callers turn that into a rejected request.
    fn parse_webhook(&self, payload: &[u8], headers: &HeaderMap) -> WebhookNotification;
}

/// Resolves the gateway adapter for a provider tag
pub struct PaymentGatewayRegistry {
    gateways: HashMap<PaymentProvider, Arc<dyn PaymentGateway>>,
}

impl PaymentGatewayRegistry {
    pub fn new() -> Self {
        Self {
            gateways: HashMap::new(),
        }
    }

    /// Registry with every provider this build supports
    pub fn standard(config: &Config) -> Self {
        Self::new()
            .register(Arc::new(StripeGateway::new(
                config.stripe_webhook_secret.clone(),
            )))
            .register(Arc::new(PayPalGateway::new(config.paypal_base_url.clone())))
    }

    pub fn register(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn resolve(&self, provider: PaymentProvider) -> Result<Arc<dyn PaymentGateway>, AppError> {
        self.gateways
            .get(&provider)
            .cloned()
            .ok_or_else(|| AppError::UnsupportedProvider(provider.to_string()))
    }
}

impl Default for PaymentGatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}
