//! Pay Lecture Handler
//!
//! Debits the wallet for a lecture purchase. The wallet row is locked for
//! the duration of the transaction so concurrent debits on the same
//! wallet serialize instead of double-spending the balance.

use sqlx::PgPool;

use crate::aggregate::{Aggregate, TransactionSource};
use crate::domain::{DomainError, Money};
use crate::error::AppError;
use crate::store::{UnitOfWork, WalletStore};

use super::{PayLectureCommand, PayLectureResult};

// =========================================================================
// PayLectureHandler
// =========================================================================

/// Handler for lecture payments out of the wallet
pub struct PayLectureHandler {
    wallets: WalletStore,
    pool: PgPool,
}

impl PayLectureHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: WalletStore::new(pool.clone()),
            pool,
        }
    }

    /// Execute the lecture payment command
    pub async fn execute(&self, command: PayLectureCommand) -> Result<PayLectureResult, AppError> {
        if command.lecture_id.is_nil() {
            return Err(AppError::InvalidRequest(
                "lecture id is required".to_string(),
            ));
        }

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        // Row lock serializes concurrent spends on this wallet
        let mut wallet = self
            .wallets
            .lock(uow.tx(), command.wallet_id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(command.wallet_id.to_string()))?;

        // Students spend from their own wallet only
        if wallet.student_id() != command.student_id {
            return Err(AppError::InvalidRequest(
                "wallet does not belong to this student".to_string(),
            ));
        }

        let amount = Money::new(command.amount, wallet.currency()).map_err(DomainError::from)?;
        let (entry, event) = wallet.debit(
            amount,
            TransactionSource::LecturePayment,
            command.lecture_id,
        )?;

        self.wallets.update_balance(uow.tx(), &wallet).await?;
        self.wallets.append_ledger_entry(uow.tx(), &entry).await?;
        uow.record(event);
        uow.commit().await?;

        tracing::info!(
            wallet_id = %wallet.id(),
            lecture_id = %command.lecture_id,
            amount = %entry.amount(),
            balance = %wallet.balance(),
            "Lecture paid from wallet"
        );

        Ok(PayLectureResult {
            entry_id: entry.id(),
            wallet_id: wallet.id(),
            lecture_id: command.lecture_id,
            amount: entry.amount().amount(),
            balance: wallet.balance().amount(),
        })
    }
}
