//! Complete Recharge Handler
//!
//! Resolves a Pending recharge to Completed or Failed from a provider
//! signal, crediting the wallet in the same transaction on completion.
//! Duplicate and racing signals are absorbed: the version guard on the
//! recharge row decides the winner, losers re-read and report a no-op.

use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::aggregate::{Aggregate, RechargeStatus, TransactionSource, WalletRecharge};
use crate::error::AppError;
use crate::store::{RechargeStore, UnitOfWork, WalletStore};

use super::{CompleteRechargeCommand, CompleteRechargeResult};

/// Attempts before a persistent version conflict is surfaced to the caller
const MAX_RETRIES: u32 = 3;

// =========================================================================
// CompleteRechargeHandler
// =========================================================================

/// Handler for resolving recharges from webhooks and integration events
pub struct CompleteRechargeHandler {
    wallets: WalletStore,
    recharges: RechargeStore,
    pool: PgPool,
}

impl CompleteRechargeHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: WalletStore::new(pool.clone()),
            recharges: RechargeStore::new(pool.clone()),
            pool,
        }
    }

    /// Execute the complete-recharge command
    pub async fn execute(
        &self,
        command: CompleteRechargeCommand,
    ) -> Result<CompleteRechargeResult, AppError> {
        let mut attempt: u32 = 0;
        loop {
            if let Some(result) = self.try_resolve(&command).await? {
                return Ok(result);
            }

            attempt += 1;
            if attempt >= MAX_RETRIES {
                return Err(AppError::VersionConflict);
            }
            // Short randomized pause before re-reading the contested row
            let jitter: u64 = rand::thread_rng().gen_range(0..25);
            tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt) + jitter)).await;
        }
    }

    /// One resolution attempt. `None` means the version guard lost a race
    /// and the caller should re-read and try again.
    async fn try_resolve(
        &self,
        command: &CompleteRechargeCommand,
    ) -> Result<Option<CompleteRechargeResult>, AppError> {
        let Some(mut recharge) = self
            .recharges
            .get_by_provider_reference(&command.provider_reference_id)
            .await?
        else {
            tracing::info!(
                provider_reference_id = %command.provider_reference_id,
                "No recharge matches the provider reference, signal ignored"
            );
            return Ok(Some(CompleteRechargeResult {
                applied: false,
                recharge_id: None,
            }));
        };

        if recharge.status().is_terminal() {
            tracing::info!(
                recharge_id = %recharge.id(),
                status = %recharge.status(),
                "Recharge already resolved, duplicate signal ignored"
            );
            return Ok(Some(CompleteRechargeResult {
                applied: false,
                recharge_id: Some(recharge.id()),
            }));
        }

        let expected = recharge.version();
        let event = match command.outcome {
            RechargeStatus::Completed => {
                recharge.mark_completed(&command.provider_reference_id)?
            }
            RechargeStatus::Failed => recharge.mark_failed()?,
            RechargeStatus::Pending => {
                return Err(AppError::InvalidRequest(
                    "recharge outcome must be completed or failed".to_string(),
                ))
            }
        };

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let updated = self
            .recharges
            .update_with_version(uow.tx(), &recharge, expected)
            .await?;
        if !updated {
            // Another delivery resolved this recharge first
            uow.rollback().await?;
            return Ok(None);
        }
        uow.record(event);

        if command.outcome == RechargeStatus::Completed {
            self.credit_wallet(&mut uow, &recharge, command.amount)
                .await?;
        }

        uow.commit().await?;

        tracing::info!(
            recharge_id = %recharge.id(),
            wallet_id = %recharge.wallet_id(),
            outcome = %recharge.status(),
            "Recharge resolved"
        );

        Ok(Some(CompleteRechargeResult {
            applied: true,
            recharge_id: Some(recharge.id()),
        }))
    }

    /// Credit the recharge amount onto the wallet inside the open
    /// transaction. The stored amount is authoritative; a differing
    /// provider-reported amount is logged, not honored.
    async fn credit_wallet(
        &self,
        uow: &mut UnitOfWork,
        recharge: &WalletRecharge,
        reported: Option<Decimal>,
    ) -> Result<(), AppError> {
        if let Some(delivered) = reported {
            if delivered != recharge.amount().amount() {
                tracing::warn!(
                    recharge_id = %recharge.id(),
                    stored = %recharge.amount().amount(),
                    reported = %delivered,
                    "Provider-reported amount differs from stored recharge amount, crediting stored amount"
                );
            }
        }

        let mut wallet = self
            .wallets
            .lock(uow.tx(), recharge.wallet_id())
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "wallet {} missing for recharge {}",
                    recharge.wallet_id(),
                    recharge.id()
                ))
            })?;

        let (entry, credited) = wallet.credit(
            recharge.amount().clone(),
            TransactionSource::Recharge,
            recharge.id(),
        )?;
        self.wallets.update_balance(uow.tx(), &wallet).await?;
        self.wallets.append_ledger_entry(uow.tx(), &entry).await?;
        uow.record(credited);

        Ok(())
    }
}
