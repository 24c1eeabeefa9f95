//! Outbox store
//!
//! Events ride along in the same transaction as the state change that
//! produced them, then get published by the relay. A row is done once
//! `processed_on` is stamped; rows with an error and no stamp are retried
//! on the next pass.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::WalletEvent;
use crate::error::AppResult;

/// One stored event awaiting publication
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_on: DateTime<Utc>,
    pub processed_on: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

type OutboxRow = (
    Uuid,
    String,
    serde_json::Value,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
);

impl From<OutboxRow> for OutboxMessage {
    fn from(row: OutboxRow) -> Self {
        let (id, event_type, payload, occurred_on, processed_on, error) = row;
        Self {
            id,
            event_type,
            payload,
            occurred_on,
            processed_on,
            error,
        }
    }
}

/// Outbox persistence
#[derive(Debug, Clone)]
pub struct OutboxStore {
    pool: PgPool,
}

impl OutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store an event in the caller's transaction
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &WalletEvent,
    ) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        let payload = serde_json::to_value(event)?;

        sqlx::query(
            r#"
            INSERT INTO outbox_messages (id, event_type, payload, occurred_on)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(event.event_type())
        .bind(payload)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Oldest unpublished rows, up to `limit`
    pub async fn fetch_unprocessed(&self, limit: i64) -> AppResult<Vec<OutboxMessage>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, event_type, payload, occurred_on, processed_on, error
            FROM outbox_messages
            WHERE processed_on IS NULL
            ORDER BY occurred_on ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OutboxMessage::from).collect())
    }

    /// Record the result of one drain pass in a single transaction.
    /// `None` marks the message published; `Some(error)` records the failure
    /// and leaves the row eligible for the next pass.
    pub async fn apply_outcomes(&self, outcomes: &[(Uuid, Option<String>)]) -> AppResult<()> {
        if outcomes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for (id, error) in outcomes {
            match error {
                None => {
                    sqlx::query(
                        "UPDATE outbox_messages SET processed_on = $2, error = NULL WHERE id = $1",
                    )
                    .bind(id)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                }
                Some(message) => {
                    sqlx::query("UPDATE outbox_messages SET error = $2 WHERE id = $1")
                        .bind(id)
                        .bind(message)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// How many rows still wait for publication
    pub async fn count_unprocessed(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox_messages WHERE processed_on IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
