//! Unit of work
//!
//! One database transaction plus the domain events recorded while it was
//! open. Commit writes every event to the outbox and then commits, so the
//! state change and its events land together or not at all. Dropping the
//! unit of work rolls the transaction back and discards the events with it.

use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::WalletEvent;
use crate::error::AppResult;

use super::OutboxStore;

pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
    outbox: OutboxStore,
    events: Vec<WalletEvent>,
}

impl UnitOfWork {
    /// Open a transaction with an empty event list
    pub async fn begin(pool: &PgPool) -> AppResult<Self> {
        Ok(Self {
            tx: pool.begin().await?,
            outbox: OutboxStore::new(pool.clone()),
            events: Vec::new(),
        })
    }

    /// The open transaction; stores write through it
    pub fn tx(&mut self) -> &mut Transaction<'static, Postgres> {
        &mut self.tx
    }

    /// Queue an event to ship with the commit
    pub fn record(&mut self, event: WalletEvent) {
        self.events.push(event);
    }

    /// Write the recorded events to the outbox, then commit
    pub async fn commit(mut self) -> AppResult<()> {
        for event in &self.events {
            let message_id = self.outbox.insert(&mut self.tx, event).await?;
            tracing::debug!(
                event_type = event.event_type(),
                %message_id,
                "Recorded outbox message"
            );
        }

        self.tx.commit().await?;
        Ok(())
    }

    /// Throw the transaction and its events away
    pub async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
