//! Wallet store
//!
//! Row persistence for wallets and their ledger entries. Wallet writes
//! always happen under a transaction holding the wallet's row lock, so
//! concurrent debits serialize at the database.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::aggregate::{
    Aggregate, TransactionSource, TransactionType, Wallet, WalletLedgerEntry,
};
use crate::domain::Money;
use crate::error::{AppError, AppResult};

type WalletRow = (
    Uuid,
    Uuid,
    Decimal,
    String,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

type LedgerRow = (
    Uuid,
    Uuid,
    Decimal,
    String,
    String,
    String,
    Uuid,
    DateTime<Utc>,
);

const WALLET_COLUMNS: &str = "id, student_id, balance, currency, is_active, created_at, updated_at";

fn wallet_from_row(row: WalletRow) -> AppResult<Wallet> {
    let (id, student_id, balance, currency, is_active, created_at, updated_at) = row;
    let balance = Money::new(balance, currency.trim())
        .map_err(|e| AppError::Internal(format!("wallet row {id} holds invalid money: {e}")))?;
    Ok(Wallet::from_db_state(
        id, student_id, balance, is_active, created_at, updated_at,
    ))
}

fn ledger_entry_from_row(row: LedgerRow) -> AppResult<WalletLedgerEntry> {
    let (id, wallet_id, amount, currency, entry_type, source, reference_id, created_at) = row;
    let amount = Money::new(amount, currency.trim())
        .map_err(|e| AppError::Internal(format!("ledger row {id} holds invalid money: {e}")))?;
    let entry_type: TransactionType = entry_type
        .parse()
        .map_err(|_| AppError::Internal(format!("ledger row {id} has unknown entry type")))?;
    let source: TransactionSource = source
        .parse()
        .map_err(|_| AppError::Internal(format!("ledger row {id} has unknown source")))?;
    Ok(WalletLedgerEntry::from_db_state(
        id, wallet_id, amount, entry_type, source, reference_id, created_at,
    ))
}

/// Wallet persistence
#[derive(Debug, Clone)]
pub struct WalletStore {
    pool: PgPool,
}

impl WalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load a wallet by id
    pub async fn get(&self, wallet_id: Uuid) -> AppResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1"
        ))
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(wallet_from_row).transpose()
    }

    /// Load the wallet owned by a student
    pub async fn get_by_student(&self, student_id: Uuid) -> AppResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE student_id = $1"
        ))
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(wallet_from_row).transpose()
    }

    /// Check whether a student already has a wallet
    pub async fn exists_for_student(&self, student_id: Uuid) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM wallets WHERE student_id = $1)")
                .bind(student_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Page through all wallets, newest first
    pub async fn list_page(&self, limit: i64, offset: i64) -> AppResult<Vec<Wallet>> {
        let rows: Vec<WalletRow> = sqlx::query_as(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(wallet_from_row).collect()
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Page through a wallet's ledger, newest first
    pub async fn ledger_page(
        &self,
        wallet_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<WalletLedgerEntry>> {
        let rows: Vec<LedgerRow> = sqlx::query_as(
            r#"
            SELECT id, wallet_id, amount, currency, entry_type, source, reference_id, created_at
            FROM wallet_ledger_entries
            WHERE wallet_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ledger_entry_from_row).collect()
    }

    // =========================================================================
    // Transactional writes
    // =========================================================================

    /// Insert a freshly created wallet
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet: &Wallet,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, student_id, balance, currency, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(wallet.id())
        .bind(wallet.student_id())
        .bind(wallet.balance().amount())
        .bind(wallet.currency())
        .bind(wallet.is_active())
        .bind(wallet.created_at())
        .bind(wallet.updated_at())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Load a wallet and take its row lock; concurrent writers queue here
    pub async fn lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
    ) -> AppResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1 FOR UPDATE"
        ))
        .bind(wallet_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(wallet_from_row).transpose()
    }

    /// Persist a balance change made by the aggregate
    pub async fn update_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet: &Wallet,
    ) -> AppResult<()> {
        sqlx::query("UPDATE wallets SET balance = $2, updated_at = $3 WHERE id = $1")
            .bind(wallet.id())
            .bind(wallet.balance().amount())
            .bind(wallet.updated_at())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Persist an activation toggle
    pub async fn update_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet: &Wallet,
    ) -> AppResult<()> {
        sqlx::query("UPDATE wallets SET is_active = $2, updated_at = $3 WHERE id = $1")
            .bind(wallet.id())
            .bind(wallet.is_active())
            .bind(wallet.updated_at())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Append one immutable ledger entry
    pub async fn append_ledger_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &WalletLedgerEntry,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_ledger_entries
                (id, wallet_id, amount, currency, entry_type, source, reference_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id())
        .bind(entry.wallet_id())
        .bind(entry.amount().amount())
        .bind(entry.amount().currency())
        .bind(entry.entry_type().as_str())
        .bind(entry.source().as_str())
        .bind(entry.reference_id())
        .bind(entry.created_at())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
