//! Integration-event consumer
//!
//! Sequential receive loop over the broker subscription, one message at a
//! time. Every delivery gets a fresh handler context; unknown message
//! types are dropped, handler failures route the message to the
//! dead-letter sink instead of requeueing it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::aggregate::RechargeStatus;
use crate::error::AppError;
use crate::handlers::{
    CompleteRechargeCommand, CompleteRechargeHandler, CreateWalletCommand, CreateWalletHandler,
    HandlerContext,
};

use super::{DeadLetterSink, MessageEnvelope};

/// Routing keys this service binds its inbound subscription to.
pub const INBOUND_BINDINGS: &[&str] = &["student.registered", "payment.completed"];

// Discriminators carried by the platform's integration events.
const STUDENT_REGISTERED: &str = "StudentRegistered";
const PAYMENT_COMPLETED: &str = "PaymentCompleted";

// =========================================================================
// Inbound event payloads
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentRegisteredEvent {
    student_id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    occurred_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentCompletedEvent {
    payment_id: Uuid,
    /// Provider-side reference, matched against the recharge's stored one
    payment_intent_id: String,
    user_id: Uuid,
    amount: Decimal,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

// =========================================================================
// IntegrationConsumer
// =========================================================================

/// What the dispatcher decided about one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// The matching handler ran to completion
    Handled,
    /// No handler is registered for the message type
    Dropped,
}

/// Consumer for the platform's integration events.
pub struct IntegrationConsumer {
    pool: PgPool,
    dead_letters: Arc<dyn DeadLetterSink>,
    default_currency: String,
}

impl IntegrationConsumer {
    pub fn new(
        pool: PgPool,
        dead_letters: Arc<dyn DeadLetterSink>,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            dead_letters,
            default_currency: default_currency.into(),
        }
    }

    /// Spawn the receive loop in the background.
    /// Returns a handle that can be used to abort it.
    pub fn start(self, receiver: UnboundedReceiver<MessageEnvelope>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(receiver).await })
    }

    async fn run(self, mut receiver: UnboundedReceiver<MessageEnvelope>) {
        tracing::info!(bindings = ?INBOUND_BINDINGS, "Integration consumer started");
        while let Some(message) = receiver.recv().await {
            match self.dispatch(&message).await {
                Ok(MessageDisposition::Handled) => {}
                Ok(MessageDisposition::Dropped) => {
                    tracing::debug!(
                        message_id = %message.message_id,
                        message_type = %message.message_type,
                        "Unknown message type, dropped"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        message_id = %message.message_id,
                        message_type = %message.message_type,
                        error = %err,
                        "Message handling failed, dead-lettering"
                    );
                    let reason = err.to_string();
                    if let Err(sink_err) = self.dead_letters.push(message, &reason).await {
                        tracing::error!(error = %sink_err, "Dead-letter push failed");
                    }
                }
            }
        }
        tracing::info!("Integration consumer stopped, subscription closed");
    }

    /// Route one delivery to its handler.
    async fn dispatch(&self, message: &MessageEnvelope) -> Result<MessageDisposition, AppError> {
        // One context per delivery keeps handler dependencies explicit.
        let context = HandlerContext::new(self.pool.clone(), self.default_currency.clone());
        match message.message_type.as_str() {
            STUDENT_REGISTERED => self.on_student_registered(&context, message).await,
            PAYMENT_COMPLETED => self.on_payment_completed(&context, message).await,
            _ => Ok(MessageDisposition::Dropped),
        }
    }

    async fn on_student_registered(
        &self,
        context: &HandlerContext,
        message: &MessageEnvelope,
    ) -> Result<MessageDisposition, AppError> {
        let event: StudentRegisteredEvent = serde_json::from_value(message.payload.clone())?;
        tracing::debug!(
            student_id = %event.student_id,
            email = ?event.email,
            occurred_on = ?event.occurred_on,
            "StudentRegistered received"
        );

        let command =
            CreateWalletCommand::new(event.student_id, context.default_currency.clone());
        let result = CreateWalletHandler::new(context.pool.clone())
            .execute(command)
            .await?;
        if !result.created {
            tracing::debug!(
                student_id = %event.student_id,
                "Duplicate registration, wallet already present"
            );
        }
        Ok(MessageDisposition::Handled)
    }

    async fn on_payment_completed(
        &self,
        context: &HandlerContext,
        message: &MessageEnvelope,
    ) -> Result<MessageDisposition, AppError> {
        let event: PaymentCompletedEvent = serde_json::from_value(message.payload.clone())?;
        tracing::debug!(
            payment_id = %event.payment_id,
            payment_intent_id = %event.payment_intent_id,
            user_id = %event.user_id,
            completed_at = ?event.completed_at,
            "PaymentCompleted received"
        );

        let command =
            CompleteRechargeCommand::new(event.payment_intent_id.clone(), RechargeStatus::Completed)
                .with_amount(event.amount);
        let result = CompleteRechargeHandler::new(context.pool.clone())
            .execute(command)
            .await?;
        if !result.applied {
            tracing::debug!(
                payment_intent_id = %event.payment_intent_id,
                "Duplicate or unknown payment signal, nothing applied"
            );
        }
        Ok(MessageDisposition::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::InMemoryBroker;
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;
    use tokio::sync::mpsc;

    fn lazy_pool() -> PgPool {
        // Never connected; these tests exercise paths that fail before
        // any query is issued.
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap()
    }

    #[test]
    fn test_unknown_message_type_is_dropped() {
        tokio_test::block_on(async {
            let broker = Arc::new(InMemoryBroker::new());
            let consumer = IntegrationConsumer::new(lazy_pool(), broker, "EGP");

            let disposition = consumer
                .dispatch(&MessageEnvelope::new("CourseDeleted", json!({})))
                .await
                .unwrap();
            assert_eq!(disposition, MessageDisposition::Dropped);
        });
    }

    #[test]
    fn test_malformed_payload_is_a_handler_error() {
        tokio_test::block_on(async {
            let broker = Arc::new(InMemoryBroker::new());
            let consumer = IntegrationConsumer::new(lazy_pool(), broker, "EGP");

            let result = consumer
                .dispatch(&MessageEnvelope::new(
                    "StudentRegistered",
                    json!({"studentId": "not-a-uuid"}),
                ))
                .await;
            assert!(matches!(result, Err(AppError::Serialization(_))));
        });
    }

    #[test]
    fn test_poison_message_is_dead_lettered_and_loop_survives() {
        tokio_test::block_on(async {
            let broker = Arc::new(InMemoryBroker::new());
            let consumer =
                IntegrationConsumer::new(lazy_pool(), broker.clone(), "EGP");

            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(MessageEnvelope::new(
                "StudentRegistered",
                json!({"studentId": 42}),
            ))
            .unwrap();
            tx.send(MessageEnvelope::new("CourseDeleted", json!({})))
                .unwrap();
            drop(tx);

            // Loop drains both messages and returns once the channel closes.
            consumer.run(rx).await;

            let parked = broker.dead_letters().await;
            assert_eq!(parked.len(), 1);
            assert_eq!(parked[0].message.message_type, "StudentRegistered");
        });
    }
}
