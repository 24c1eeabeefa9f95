//! Wallet Status Handlers
//!
//! Freeze and unfreeze a wallet. Both handlers are idempotent: asking for
//! the state the wallet is already in succeeds without touching the row
//! or emitting an event.

use sqlx::PgPool;

use crate::aggregate::Aggregate;
use crate::error::AppError;
use crate::store::{UnitOfWork, WalletStore};

use super::{DeactivateWalletCommand, ReactivateWalletCommand, WalletStatusResult};

// =========================================================================
// DeactivateWalletHandler
// =========================================================================

/// Handler for freezing a wallet
pub struct DeactivateWalletHandler {
    wallets: WalletStore,
    pool: PgPool,
}

impl DeactivateWalletHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: WalletStore::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(
        &self,
        command: DeactivateWalletCommand,
    ) -> Result<WalletStatusResult, AppError> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let mut wallet = self
            .wallets
            .lock(uow.tx(), command.wallet_id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(command.wallet_id.to_string()))?;

        if !wallet.is_active() {
            tracing::debug!(wallet_id = %wallet.id(), "Wallet already inactive");
            return Ok(WalletStatusResult {
                wallet_id: wallet.id(),
                is_active: false,
                changed: false,
            });
        }

        let event = wallet.deactivate()?;
        self.wallets.update_status(uow.tx(), &wallet).await?;
        uow.record(event);
        uow.commit().await?;

        tracing::info!(wallet_id = %wallet.id(), "Wallet deactivated");
        Ok(WalletStatusResult {
            wallet_id: wallet.id(),
            is_active: false,
            changed: true,
        })
    }
}

// =========================================================================
// ReactivateWalletHandler
// =========================================================================

/// Handler for unfreezing a wallet
pub struct ReactivateWalletHandler {
    wallets: WalletStore,
    pool: PgPool,
}

impl ReactivateWalletHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: WalletStore::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(
        &self,
        command: ReactivateWalletCommand,
    ) -> Result<WalletStatusResult, AppError> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let mut wallet = self
            .wallets
            .lock(uow.tx(), command.wallet_id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(command.wallet_id.to_string()))?;

        if wallet.is_active() {
            tracing::debug!(wallet_id = %wallet.id(), "Wallet already active");
            return Ok(WalletStatusResult {
                wallet_id: wallet.id(),
                is_active: true,
                changed: false,
            });
        }

        let event = wallet.reactivate()?;
        self.wallets.update_status(uow.tx(), &wallet).await?;
        uow.record(event);
        uow.commit().await?;

        tracing::info!(wallet_id = %wallet.id(), "Wallet reactivated");
        Ok(WalletStatusResult {
            wallet_id: wallet.id(),
            is_active: true,
            changed: true,
        })
    }
}
