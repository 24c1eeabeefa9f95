//! Recharge Aggregate
//!
//! A recharge tracks one attempt to add money to a wallet through an
//! external payment provider. It starts Pending, gets a provider session
//! attached, and ends Completed or Failed exactly once. The version counter
//! is bumped on every mutation; persistence writes are conditioned on it so
//! a webhook and a retry can never both win.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{DomainError, Money, WalletEvent};

use super::Aggregate;

/// Recharge lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RechargeStatus {
    Pending,
    Completed,
    Failed,
}

impl RechargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RechargeStatus::Pending => "pending",
            RechargeStatus::Completed => "completed",
            RechargeStatus::Failed => "failed",
        }
    }

    /// Completed and Failed accept no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RechargeStatus::Pending)
    }
}

impl fmt::Display for RechargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RechargeStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RechargeStatus::Pending),
            "completed" => Ok(RechargeStatus::Completed),
            "failed" => Ok(RechargeStatus::Failed),
            other => Err(DomainError::InvalidReference(format!(
                "unknown recharge status '{other}'"
            ))),
        }
    }
}

/// Payment provider handling a recharge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Paypal,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paypal => "paypal",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stripe" => Ok(PaymentProvider::Stripe),
            "paypal" => Ok(PaymentProvider::Paypal),
            other => Err(DomainError::InvalidReference(format!(
                "unknown payment provider '{other}'"
            ))),
        }
    }
}

/// Recharge Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecharge {
    id: Uuid,
    wallet_id: Uuid,
    /// Provider-side identifier; empty until a session is attached
    provider_reference_id: String,
    amount: Money,
    status: RechargeStatus,
    payment_provider: PaymentProvider,
    /// Secret the client uses to drive the provider's checkout UI
    client_payment_token: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl WalletRecharge {
    // =========================================================================
    // WalletRecharge::create()
    // =========================================================================

    /// Open a pending recharge for a wallet
    pub fn create(
        wallet_id: Uuid,
        amount: Money,
        payment_provider: PaymentProvider,
    ) -> Result<(Self, WalletEvent), DomainError> {
        if wallet_id.is_nil() {
            return Err(DomainError::InvalidReference(
                "recharge requires a wallet id".to_string(),
            ));
        }
        if !amount.is_positive() {
            return Err(DomainError::InvalidAmount(
                "recharge amount must be positive".to_string(),
            ));
        }

        let recharge = Self {
            id: Uuid::new_v4(),
            wallet_id,
            provider_reference_id: String::new(),
            amount: amount.clone(),
            status: RechargeStatus::Pending,
            payment_provider,
            client_payment_token: None,
            version: 1,
            created_at: Utc::now(),
            completed_at: None,
        };

        let event = WalletEvent::WalletRechargeCreated {
            recharge_id: recharge.id,
            wallet_id,
            amount,
        };

        Ok((recharge, event))
    }

    /// Rebuild a recharge from its database row
    #[allow(clippy::too_many_arguments)]
    pub fn from_db_state(
        id: Uuid,
        wallet_id: Uuid,
        provider_reference_id: String,
        amount: Money,
        status: RechargeStatus,
        payment_provider: PaymentProvider,
        client_payment_token: Option<String>,
        version: i64,
        created_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
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
        }
    }

    // =========================================================================
    // WalletRecharge::attach_provider_session()
    // =========================================================================

    /// Attach the provider's checkout session to this recharge.
    /// Re-attaching while still Pending overwrites the previous session.
    pub fn attach_provider_session(
        &mut self,
        provider_reference_id: String,
        client_payment_token: String,
    ) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                "given a provider session",
            ));
        }
        if provider_reference_id.is_empty() {
            return Err(DomainError::InvalidReference(
                "provider reference must not be empty".to_string(),
            ));
        }
        if client_payment_token.is_empty() {
            return Err(DomainError::InvalidReference(
                "client payment token must not be empty".to_string(),
            ));
        }

        self.provider_reference_id = provider_reference_id;
        self.client_payment_token = Some(client_payment_token);
        self.version += 1;

        Ok(())
    }

    // =========================================================================
    // Terminal transitions
    // =========================================================================

    /// Confirm the recharge after the provider reports a successful payment.
    /// Requires Pending and a reference match against the attached session.
    pub fn mark_completed(
        &mut self,
        provider_reference_id: &str,
    ) -> Result<WalletEvent, DomainError> {
        if self.status != RechargeStatus::Pending {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                "completed",
            ));
        }
        // An empty stored reference means no session was ever attached; no
        // notification can legitimately match it.
        if self.provider_reference_id.is_empty()
            || self.provider_reference_id != provider_reference_id
        {
            return Err(DomainError::ReferenceMismatch {
                provided: provider_reference_id.to_string(),
            });
        }

        self.status = RechargeStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.version += 1;

        Ok(WalletEvent::WalletRechargeCompleted {
            recharge_id: self.id,
            wallet_id: self.wallet_id,
        })
    }

    /// Close the recharge after the provider reports a failed or cancelled
    /// payment. Requires Pending only; a recharge whose session was never
    /// attached can still be failed.
    pub fn mark_failed(&mut self) -> Result<WalletEvent, DomainError> {
        if self.status != RechargeStatus::Pending {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                "failed",
            ));
        }

        self.status = RechargeStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.version += 1;

        Ok(WalletEvent::WalletRechargeFailed {
            recharge_id: self.id,
            wallet_id: self.wallet_id,
        })
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn wallet_id(&self) -> Uuid {
        self.wallet_id
    }

    pub fn provider_reference_id(&self) -> &str {
        &self.provider_reference_id
    }

    pub fn amount(&self) -> &Money {
        &self.amount
    }

    pub fn status(&self) -> RechargeStatus {
        self.status
    }

    pub fn payment_provider(&self) -> PaymentProvider {
        self.payment_provider
    }

    pub fn client_payment_token(&self) -> Option<&str> {
        self.client_payment_token.as_deref()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

impl Aggregate for WalletRecharge {
    fn aggregate_type() -> &'static str {
        "WalletRecharge"
    }

    fn id(&self) -> Uuid {
        self.id
    }
}
