//! Background Jobs
//!
//! The outbox relay: a periodic task that drains unprocessed outbox rows
//! to the message broker, so committed state changes eventually reach the
//! outside world even when the broker was down at commit time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time::interval;
use uuid::Uuid;

use crate::domain::{routing_key_for, EVENT_EXCHANGE};
use crate::messaging::{EventPublisher, MessageEnvelope};
use crate::store::{OutboxMessage, OutboxStore};

// =========================================================================
// Outbox Drain
// =========================================================================

/// Publish one batch of unprocessed outbox rows.
///
/// Outcomes are applied in a single batch write after the whole batch has
/// been attempted: published rows get `processed_on` stamped, failed rows
/// keep it null with the failure recorded, so the next pass retries them.
/// Delivery is therefore at-least-once and one bad message never blocks
/// the rest of the batch.
pub async fn drain_outbox(
    pool: &PgPool,
    publisher: &dyn EventPublisher,
    batch_size: i64,
) -> Result<DrainReport, JobError> {
    let outbox = OutboxStore::new(pool.clone());
    let messages = outbox.fetch_unprocessed(batch_size).await?;
    if messages.is_empty() {
        return Ok(DrainReport::default());
    }

    let mut outcomes: Vec<(Uuid, Option<String>)> = Vec::with_capacity(messages.len());
    let mut published = 0u64;
    let mut failed = 0u64;

    for message in &messages {
        match publish_message(publisher, message).await {
            Ok(()) => {
                published += 1;
                outcomes.push((message.id, None));
            }
            Err(reason) => {
                failed += 1;
                tracing::warn!(
                    message_id = %message.id,
                    event_type = %message.event_type,
                    error = %reason,
                    "Outbox publish failed, row stays queued"
                );
                outcomes.push((message.id, Some(reason)));
            }
        }
    }

    outbox.apply_outcomes(&outcomes).await?;

    tracing::info!(
        fetched = messages.len(),
        published,
        failed,
        "Outbox drain pass finished"
    );

    Ok(DrainReport {
        fetched: messages.len() as u64,
        published,
        failed,
        completed_at: Utc::now(),
    })
}

async fn publish_message(
    publisher: &dyn EventPublisher,
    message: &OutboxMessage,
) -> Result<(), String> {
    // An unroutable type means the producer and this relay disagree on
    // the event set; the row keeps failing until a deploy fixes the skew.
    let Some(routing_key) = routing_key_for(&message.event_type) else {
        return Err(format!(
            "no routing key for event type '{}'",
            message.event_type
        ));
    };

    let envelope = MessageEnvelope::with_id(
        message.id,
        message.event_type.clone(),
        message.payload.clone(),
    );
    publisher
        .publish(EVENT_EXCHANGE, routing_key, envelope)
        .await
        .map_err(|e| e.to_string())
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    pub fetched: u64,
    pub published: u64,
    pub failed: u64,
    pub completed_at: DateTime<Utc>,
}

// =========================================================================
// Outbox Relay
// =========================================================================

/// Configuration for the outbox relay
#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    /// How often a drain pass runs (default: 1 minute)
    pub poll_interval: Duration,
    /// Maximum rows fetched per pass (default: 20)
    pub batch_size: i64,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            batch_size: 20,
        }
    }
}

/// Outbox relay - periodically drains the outbox to the broker
pub struct OutboxRelay {
    pool: PgPool,
    publisher: Arc<dyn EventPublisher>,
    config: OutboxRelayConfig,
}

impl OutboxRelay {
    /// Create a relay with default configuration
    pub fn new(pool: PgPool, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            pool,
            publisher,
            config: OutboxRelayConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(
        pool: PgPool,
        publisher: Arc<dyn EventPublisher>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            pool,
            publisher,
            config,
        }
    }

    /// Start the relay in the background.
    /// Returns a handle that can be used to abort it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Run the drain loop
    async fn run(&self) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Outbox relay started"
        );

        let mut ticker = interval(self.config.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) =
                drain_outbox(&self.pool, self.publisher.as_ref(), self.config.batch_size).await
            {
                tracing::error!(error = %e, "Outbox drain pass failed");
            }
        }
    }

    /// Run a single drain pass (for manual trigger or testing)
    pub async fn run_once(&self) -> Result<DrainReport, JobError> {
        drain_outbox(&self.pool, self.publisher.as_ref(), self.config.batch_size).await
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] crate::error::AppError),
}

// =========================================================================
// Tests
// =========================================================================
