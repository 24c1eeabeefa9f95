//! PayPal gateway adapter
//!
//! Maps checkout-order webhook events onto the recharge lifecycle. Order
//! identifiers are minted here; the approval link handed back as the client
//! token is what the frontend redirects the student to.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;
use uuid::Uuid;

use crate::aggregate::{PaymentProvider, RechargeStatus};

use super::{
    CheckoutSession, CreateSessionRequest, GatewayError, PaymentGateway, WebhookNotification,
};

pub struct PayPalGateway {
    base_url: String,
}

impl PayPalGateway {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

/// PayPal webhook envelope
#[derive(Debug, Deserialize)]
struct PayPalWebhookEvent {
    event_type: String,
    resource: PayPalResource,
}

#[derive(Debug, Deserialize)]
struct PayPalResource {
    id: String,
}

fn map_status(event_type: &str) -> RechargeStatus {
    match event_type {
        "CHECKOUT.ORDER.APPROVED" | "PAYMENT.CAPTURE.COMPLETED" => RechargeStatus::Completed,
        "CHECKOUT.ORDER.CANCELLED" => RechargeStatus::Failed,
        _ => RechargeStatus::Pending,
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paypal
    }

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        // The order's return and cancel urls both point at the callback
        if request.callback_url.is_empty() {
            return Err(GatewayError::SessionCreation(
                "paypal orders require a callback url".to_string(),
            ));
        }

        let order_id = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        let approve_url = format!("{}/checkoutnow?token={}", self.base_url, order_id);

        tracing::debug!(
            wallet_id = %request.wallet_id,
            recharge_id = %request.recharge_id,
            amount = %request.amount,
            "Opened paypal order {}",
            order_id
        );

        Ok(CheckoutSession {
            provider_reference_id: order_id,
            client_payment_token: Some(approve_url),
        })
    }

    async fn cancel_session(&self, provider_reference_id: &str) -> Result<(), GatewayError> {
        // PayPal orders cannot be cancelled like payment intents; an
        // unapproved order expires on its own
        tracing::debug!("Leaving paypal order {} to expire", provider_reference_id);
        Ok(())
    }

    fn parse_webhook(&self, payload: &[u8], headers: &HeaderMap) -> WebhookNotification {
        // Every genuine provider notification carries a transmission id
        if !headers.contains_key("PayPal-Transmission-Id") {
            return WebhookNotification::invalid();
        }

        let event: PayPalWebhookEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(_) => return WebhookNotification::invalid(),
        };

        WebhookNotification {
            is_valid: true,
            provider_reference_id: event.resource.id,
            status: map_status(&event.event_type),
            amount: None,
        }
    }
}
