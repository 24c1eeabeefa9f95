//! Recharge store
//!
//! Row persistence for recharges. Updates are compare-and-swap on the
//! version column, so two webhook deliveries racing on the same recharge
//! resolve at the database instead of last-writer-wins.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::aggregate::{Aggregate, PaymentProvider, RechargeStatus, WalletRecharge};
use crate::domain::Money;
use crate::error::{AppError, AppResult};

type RechargeRow = (
    Uuid,
    Uuid,
    String,
    Decimal,
    String,
    String,
    String,
    Option<String>,
    i64,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const RECHARGE_COLUMNS: &str = "id, wallet_id, provider_reference_id, amount, currency, status, \
     payment_provider, client_payment_token, version, created_at, completed_at";

fn recharge_from_row(row: RechargeRow) -> AppResult<WalletRecharge> {
    let (
        id,
        wallet_id,
        provider_reference_id,
        amount,
        currency,
        status,
        payment_provider,
        client_payment_token,
        version,
        created_at,
        completed_at,
    ) = row;

    let amount = Money::new(amount, currency.trim())
        .map_err(|e| AppError::Internal(format!("recharge row {id} holds invalid money: {e}")))?;
    let status: RechargeStatus = status
        .parse()
        .map_err(|_| AppError::Internal(format!("recharge row {id} has unknown status")))?;
    let payment_provider: PaymentProvider = payment_provider
        .parse()
        .map_err(|_| AppError::Internal(format!("recharge row {id} has unknown provider")))?;

    Ok(WalletRecharge::from_db_state(
        id,
        wallet_id,
        provider_reference_id,
        amount,
        status,
        payment_provider,
        client_payment_token,
        version,
        created_at,
        completed_at,
    ))
}

/// Recharge persistence
#[derive(Debug, Clone)]
pub struct RechargeStore {
    pool: PgPool,
}

impl RechargeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load a recharge by id
    pub async fn get(&self, recharge_id: Uuid) -> AppResult<Option<WalletRecharge>> {
        let row: Option<RechargeRow> = sqlx::query_as(&format!(
            "SELECT {RECHARGE_COLUMNS} FROM wallet_recharges WHERE id = $1"
        ))
        .bind(recharge_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(recharge_from_row).transpose()
    }

    /// Load the recharge a provider notification refers to.
    /// An empty reference never matches; unattached recharges all share it.
    pub async fn get_by_provider_reference(
        &self,
        provider_reference_id: &str,
    ) -> AppResult<Option<WalletRecharge>> {
        if provider_reference_id.is_empty() {
            return Ok(None);
        }

        let row: Option<RechargeRow> = sqlx::query_as(&format!(
            "SELECT {RECHARGE_COLUMNS} FROM wallet_recharges WHERE provider_reference_id = $1"
        ))
        .bind(provider_reference_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(recharge_from_row).transpose()
    }

    /// Check whether a wallet already has an open recharge
    pub async fn has_pending_recharge(&self, wallet_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM wallet_recharges WHERE wallet_id = $1 AND status = 'pending'
            )
            "#,
        )
        .bind(wallet_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// All open recharges for a wallet, newest first
    pub async fn pending_by_wallet(&self, wallet_id: Uuid) -> AppResult<Vec<WalletRecharge>> {
        let rows: Vec<RechargeRow> = sqlx::query_as(&format!(
            "SELECT {RECHARGE_COLUMNS} FROM wallet_recharges \
             WHERE wallet_id = $1 AND status = 'pending' ORDER BY created_at DESC"
        ))
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(recharge_from_row).collect()
    }

    /// Sum of everything successfully recharged into a wallet
    pub async fn total_recharged(&self, wallet_id: Uuid) -> AppResult<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM wallet_recharges
            WHERE wallet_id = $1 AND status = 'completed'
            "#,
        )
        .bind(wallet_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    // =========================================================================
    // Transactional writes
    // =========================================================================

    /// Insert a freshly created recharge
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        recharge: &WalletRecharge,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_recharges
                (id, wallet_id, provider_reference_id, amount, currency, status,
                 payment_provider, client_payment_token, version, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(recharge.id())
        .bind(recharge.wallet_id())
        .bind(recharge.provider_reference_id())
        .bind(recharge.amount().amount())
        .bind(recharge.amount().currency())
        .bind(recharge.status().as_str())
        .bind(recharge.payment_provider().as_str())
        .bind(recharge.client_payment_token())
        .bind(recharge.version())
        .bind(recharge.created_at())
        .bind(recharge.completed_at())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Write the recharge's mutable state, conditioned on the version the
    /// caller loaded. Returns false when someone else won the race; the
    /// transaction then holds a stale write and must be rolled back.
    pub async fn update_with_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        recharge: &WalletRecharge,
        expected_version: i64,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_recharges
            SET provider_reference_id = $2,
                status = $3,
                client_payment_token = $4,
                version = $5,
                completed_at = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(recharge.id())
        .bind(recharge.provider_reference_id())
        .bind(recharge.status().as_str())
        .bind(recharge.client_payment_token())
        .bind(recharge.version())
        .bind(recharge.completed_at())
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
