//! In-memory broker
//!
//! Topic-style broker backed by tokio channels. Subscribers bind a queue
//! to a set of routing keys; publishing fans a copy out to every live
//! subscriber bound to that key. Messages published to a key with no
//! bindings are dropped, matching topic-exchange semantics.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use super::{DeadLetterSink, EventPublisher, MessageEnvelope, PublishError};

/// A message that exhausted handling and was parked for inspection.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: MessageEnvelope,
    pub reason: String,
}

/// In-process broker routing messages to subscribers by exact routing key.
#[derive(Default)]
pub struct InMemoryBroker {
    bindings: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<MessageEnvelope>>>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new subscriber queue to the given routing keys.
    pub async fn subscribe(
        &self,
        routing_keys: &[&str],
    ) -> mpsc::UnboundedReceiver<MessageEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut bindings = self.bindings.lock().await;
        for key in routing_keys {
            bindings
                .entry((*key).to_string())
                .or_default()
                .push(tx.clone());
        }
        rx
    }

    /// Snapshot of everything parked on the dead-letter store.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: MessageEnvelope,
    ) -> Result<(), PublishError> {
        let mut bindings = self.bindings.lock().await;
        let Some(senders) = bindings.get_mut(routing_key) else {
            tracing::debug!(
                exchange,
                routing_key,
                message_type = %message.message_type,
                "No subscribers bound, message dropped"
            );
            return Ok(());
        };

        // Subscribers that dropped their receiver are pruned on the way.
        senders.retain(|tx| tx.send(message.clone()).is_ok());

        if senders.is_empty() {
            tracing::debug!(
                exchange,
                routing_key,
                message_type = %message.message_type,
                "All subscribers gone, message dropped"
            );
        } else {
            tracing::debug!(
                exchange,
                routing_key,
                message_type = %message.message_type,
                delivered = senders.len(),
                "Message delivered"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryBroker {
    async fn push(&self, message: MessageEnvelope, reason: &str) -> Result<(), PublishError> {
        tracing::warn!(
            message_id = %message.message_id,
            message_type = %message.message_type,
            reason,
            "Message dead-lettered"
        );
        self.dead_letters.lock().await.push(DeadLetter {
            message,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_reaches_subscriber() {
        tokio_test::block_on(async {
            let broker = InMemoryBroker::new();
            let mut rx = broker.subscribe(&["wallet.created"]).await;

            let envelope = MessageEnvelope::new("WalletCreated", json!({"walletId": "w"}));
            broker
                .publish("wallet.events", "wallet.created", envelope.clone())
                .await
                .unwrap();

            let received = rx.recv().await.unwrap();
            assert_eq!(received.message_id, envelope.message_id);
            assert_eq!(received.message_type, "WalletCreated");
        });
    }

    #[test]
    fn test_publish_without_binding_is_dropped() {
        tokio_test::block_on(async {
            let broker = InMemoryBroker::new();
            let result = broker
                .publish(
                    "wallet.events",
                    "wallet.debited",
                    MessageEnvelope::new("WalletDebited", json!({})),
                )
                .await;
            assert!(result.is_ok());
        });
    }

    #[test]
    fn test_publish_fans_out_to_all_subscribers() {
        tokio_test::block_on(async {
            let broker = InMemoryBroker::new();
            let mut first = broker.subscribe(&["payment.completed"]).await;
            let mut second = broker.subscribe(&["payment.completed"]).await;

            broker
                .publish(
                    "platform.events",
                    "payment.completed",
                    MessageEnvelope::new("PaymentCompleted", json!({})),
                )
                .await
                .unwrap();

            assert!(first.recv().await.is_some());
            assert!(second.recv().await.is_some());
        });
    }

    #[test]
    fn test_subscriber_only_sees_bound_keys() {
        tokio_test::block_on(async {
            let broker = InMemoryBroker::new();
            let mut rx = broker.subscribe(&["student.registered"]).await;

            broker
                .publish(
                    "platform.events",
                    "payment.completed",
                    MessageEnvelope::new("PaymentCompleted", json!({})),
                )
                .await
                .unwrap();
            broker
                .publish(
                    "platform.events",
                    "student.registered",
                    MessageEnvelope::new("StudentRegistered", json!({})),
                )
                .await
                .unwrap();

            let received = rx.recv().await.unwrap();
            assert_eq!(received.message_type, "StudentRegistered");
            assert!(rx.try_recv().is_err());
        });
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        tokio_test::block_on(async {
            let broker = InMemoryBroker::new();
            let rx = broker.subscribe(&["wallet.created"]).await;
            drop(rx);

            let result = broker
                .publish(
                    "wallet.events",
                    "wallet.created",
                    MessageEnvelope::new("WalletCreated", json!({})),
                )
                .await;
            assert!(result.is_ok());
        });
    }

    #[test]
    fn test_dead_letter_push_records_message_and_reason() {
        tokio_test::block_on(async {
            let broker = InMemoryBroker::new();
            let envelope = MessageEnvelope::new("PaymentCompleted", json!({"bad": true}));
            broker
                .push(envelope.clone(), "handler failed: wallet missing")
                .await
                .unwrap();

            let parked = broker.dead_letters().await;
            assert_eq!(parked.len(), 1);
            assert_eq!(parked[0].message.message_id, envelope.message_id);
            assert_eq!(parked[0].reason, "handler failed: wallet missing");
        });
    }
}
