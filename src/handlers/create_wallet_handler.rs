//! Create Wallet Handler
//!
//! Opens a wallet when a student registers. Safe under duplicate and
//! concurrent registration signals: a student ends up with exactly one
//! wallet no matter how often the signal is delivered.

use sqlx::PgPool;

use crate::aggregate::{Aggregate, Wallet};
use crate::error::AppError;
use crate::store::{is_unique_violation, UnitOfWork, WalletStore};

use super::{CreateWalletCommand, CreateWalletResult};

// =========================================================================
// CreateWalletHandler
// =========================================================================

/// Handler for wallet creation
pub struct CreateWalletHandler {
    wallets: WalletStore,
    pool: PgPool,
}

impl CreateWalletHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: WalletStore::new(pool.clone()),
            pool,
        }
    }

    /// Execute the create-wallet command
    pub async fn execute(
        &self,
        command: CreateWalletCommand,
    ) -> Result<CreateWalletResult, AppError> {
        // 1. Existing wallet means a duplicate signal; report success
        if let Some(existing) = self.wallets.get_by_student(command.student_id).await? {
            tracing::info!(
                student_id = %command.student_id,
                wallet_id = %existing.id(),
                "Wallet already exists, duplicate registration ignored"
            );
            return Ok(CreateWalletResult {
                wallet_id: existing.id(),
                student_id: command.student_id,
                created: false,
            });
        }

        let (wallet, event) = Wallet::create(command.student_id, &command.currency)?;

        // 2. Insert wallet and outbox row in one transaction
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        if let Err(err) = self.wallets.insert(uow.tx(), &wallet).await {
            // Two deliveries can pass the existence check together; the
            // unique student_id constraint settles the race
            if let AppError::Database(db_err) = &err {
                if is_unique_violation(db_err) {
                    uow.rollback().await?;
                    let existing = self
                        .wallets
                        .get_by_student(command.student_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::Internal(format!(
                                "wallet for student {} vanished after unique violation",
                                command.student_id
                            ))
                        })?;
                    tracing::info!(
                        student_id = %command.student_id,
                        wallet_id = %existing.id(),
                        "Concurrent registration lost the insert race, reusing existing wallet"
                    );
                    return Ok(CreateWalletResult {
                        wallet_id: existing.id(),
                        student_id: command.student_id,
                        created: false,
                    });
                }
            }
            return Err(err);
        }
        uow.record(event);
        uow.commit().await?;

        tracing::info!(
            student_id = %command.student_id,
            wallet_id = %wallet.id(),
            currency = %command.currency,
            "Wallet created"
        );

        Ok(CreateWalletResult {
            wallet_id: wallet.id(),
            student_id: command.student_id,
            created: true,
        })
    }
}
