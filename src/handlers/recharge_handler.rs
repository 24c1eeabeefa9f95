//! Recharge Handler
//!
//! Issues a wallet top-up: persists the Pending recharge first, then asks
//! the payment provider for a checkout session and attaches it. A gateway
//! failure after the first commit leaves a recoverable Pending recharge
//! with no provider reference, visible through the pending-recharges query.

use std::sync::Arc;

use sqlx::PgPool;

use crate::aggregate::{Aggregate, PaymentProvider, WalletRecharge};
use crate::domain::{DomainError, Money};
use crate::error::AppError;
use crate::gateway::{CreateSessionRequest, GatewayError, PaymentGatewayRegistry};
use crate::store::{RechargeStore, UnitOfWork, WalletStore};

use super::{RechargeWalletCommand, RechargeWalletResult};

// =========================================================================
// RechargeWalletHandler
// =========================================================================

/// Handler for issuing wallet recharges
pub struct RechargeWalletHandler {
    wallets: WalletStore,
    recharges: RechargeStore,
    gateways: Arc<PaymentGatewayRegistry>,
    pool: PgPool,
}

impl RechargeWalletHandler {
    pub fn new(pool: PgPool, gateways: Arc<PaymentGatewayRegistry>) -> Self {
        Self {
            wallets: WalletStore::new(pool.clone()),
            recharges: RechargeStore::new(pool.clone()),
            gateways,
            pool,
        }
    }

    /// Execute the recharge command
    pub async fn execute(
        &self,
        command: RechargeWalletCommand,
    ) -> Result<RechargeWalletResult, AppError> {
        // 1. Provider must be registered
        let provider: PaymentProvider = command
            .payment_provider
            .parse()
            .map_err(|_| AppError::UnsupportedProvider(command.payment_provider.clone()))?;
        let gateway = self.gateways.resolve(provider)?;

        if command.callback_url.is_empty() {
            return Err(AppError::InvalidRequest(
                "callback url is required".to_string(),
            ));
        }

        // 2. Wallet must exist, be active, and match the requested currency
        let wallet = self
            .wallets
            .get(command.wallet_id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(command.wallet_id.to_string()))?;
        if !wallet.is_active() {
            return Err(DomainError::WalletNotActive.into());
        }

        let amount = Money::new(command.amount, &command.currency).map_err(DomainError::from)?;
        if amount.currency() != wallet.currency() {
            return Err(DomainError::CurrencyMismatch {
                left: amount.currency().to_string(),
                right: wallet.currency().to_string(),
            }
            .into());
        }

        // 3. One in-flight recharge per wallet
        if self.recharges.has_pending_recharge(wallet.id()).await? {
            return Err(DomainError::BusinessRuleViolation(
                "wallet already has a pending recharge".to_string(),
            )
            .into());
        }

        // 4. Commit the Pending recharge before any provider call
        let (mut recharge, created_event) =
            WalletRecharge::create(wallet.id(), amount.clone(), provider)?;
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        self.recharges.insert(uow.tx(), &recharge).await?;
        uow.record(created_event);
        uow.commit().await?;

        // 5. Create the checkout session with the provider
        let request = CreateSessionRequest {
            wallet_id: wallet.id(),
            recharge_id: recharge.id(),
            amount: amount.clone(),
            callback_url: command.callback_url.clone(),
        };
        let session = gateway.create_session(&request).await?;
        let token = session
            .client_payment_token
            .clone()
            .ok_or(GatewayError::MissingToken)?;

        // 6. Attach the session under the version guard
        let expected = recharge.version();
        recharge.attach_provider_session(session.provider_reference_id.clone(), token)?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let updated = self
            .recharges
            .update_with_version(uow.tx(), &recharge, expected)
            .await?;
        if !updated {
            uow.rollback().await?;
            return Err(AppError::VersionConflict);
        }
        uow.commit().await?;

        tracing::info!(
            recharge_id = %recharge.id(),
            wallet_id = %wallet.id(),
            provider = %provider,
            amount = %amount,
            "Recharge issued"
        );

        Ok(RechargeWalletResult {
            recharge_id: recharge.id(),
            wallet_id: wallet.id(),
            amount: amount.amount(),
            currency: amount.currency().to_string(),
            status: recharge.status(),
            payment_provider: provider,
            provider_reference_id: recharge.provider_reference_id().to_string(),
            client_payment_token: recharge.client_payment_token().map(str::to_string),
        })
    }
}
