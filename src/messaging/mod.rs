//! Messaging
//!
//! Broker ports and the envelope that crosses them. The outbox relay
//! publishes wallet events through `EventPublisher`; the integration
//! consumer receives platform events from a subscription and pushes
//! messages it cannot handle to the `DeadLetterSink`.
//!
//! The concrete adapter in this crate is an in-process broker used for
//! local runs and tests; a deployment fronted by a real broker swaps in
//! an adapter implementing the same ports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod consumer;
mod memory;

pub use consumer::{IntegrationConsumer, MessageDisposition, INBOUND_BINDINGS};
pub use memory::{DeadLetter, InMemoryBroker};

// =========================================================================
// Message Envelope
// =========================================================================

/// One broker message: a type discriminator plus its JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_id: Uuid,
    pub message_type: String,
    pub payload: serde_json::Value,
}

impl MessageEnvelope {
    pub fn new(message_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            message_type: message_type.into(),
            payload,
        }
    }

    /// Envelope carrying a caller-chosen id, e.g. the outbox row id, so the
    /// message stays traceable back to its durable origin.
    pub fn with_id(
        message_id: Uuid,
        message_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_id,
            message_type: message_type.into(),
            payload,
        }
    }
}

// =========================================================================
// Ports
// =========================================================================

/// Publish failures surfaced by a broker adapter.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish to '{routing_key}' failed: {reason}")]
    Delivery {
        routing_key: String,
        reason: String,
    },
}

/// Outbound port: deliver a message to an exchange under a routing key.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: MessageEnvelope,
    ) -> Result<(), PublishError>;
}

/// Terminal parking spot for messages whose handler failed.
/// Pushed messages are never requeued for inline retry.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn push(&self, message: MessageEnvelope, reason: &str) -> Result<(), PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_new_mints_id() {
        let a = MessageEnvelope::new("StudentRegistered", json!({"studentId": "x"}));
        let b = MessageEnvelope::new("StudentRegistered", json!({"studentId": "x"}));
        assert_ne!(a.message_id, b.message_id);
        assert_eq!(a.message_type, "StudentRegistered");
    }

    #[test]
    fn test_envelope_with_id_keeps_id() {
        let id = Uuid::new_v4();
        let envelope = MessageEnvelope::with_id(id, "WalletCreated", json!({}));
        assert_eq!(envelope.message_id, id);
    }

    #[test]
    fn test_envelope_round_trips_as_json() {
        let envelope = MessageEnvelope::new("PaymentCompleted", json!({"amount": "50.00"}));
        let serialized = serde_json::to_string(&envelope).unwrap();
        let parsed: MessageEnvelope = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed.message_id, envelope.message_id);
        assert_eq!(parsed.payload["amount"], "50.00");
    }
}
