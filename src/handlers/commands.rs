//! Command definitions
//!
//! Commands represent intentions to change the system state.
//! Results carry enough for the caller to tell a fresh mutation from an
//! idempotent no-op.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{PaymentProvider, RechargeStatus};

// =========================================================================
// CreateWalletCommand
// =========================================================================

/// Command to open a wallet for a newly registered student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWalletCommand {
    pub student_id: Uuid,
    /// Currency the wallet is denominated in, e.g. "EGP"
    pub currency: String,
}

impl CreateWalletCommand {
    pub fn new(student_id: Uuid, currency: String) -> Self {
        Self {
            student_id,
            currency,
        }
    }
}

// =========================================================================
// RechargeWalletCommand
// =========================================================================

/// Command to top up a wallet through an external payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeWalletCommand {
    pub wallet_id: Uuid,
    pub amount: Decimal,
    /// Must match the wallet's currency
    pub currency: String,
    /// Provider tag resolved against the gateway registry ("stripe", "paypal")
    pub payment_provider: String,
    /// Where the provider sends the student after checkout
    pub callback_url: String,
}

impl RechargeWalletCommand {
    pub fn new(
        wallet_id: Uuid,
        amount: Decimal,
        currency: String,
        payment_provider: String,
    ) -> Self {
        Self {
            wallet_id,
            amount,
            currency,
            payment_provider,
            callback_url: String::new(),
        }
    }

    pub fn with_callback_url(mut self, callback_url: String) -> Self {
        self.callback_url = callback_url;
        self
    }
}

// =========================================================================
// CompleteRechargeCommand
// =========================================================================

/// Command to resolve a pending recharge from a provider signal
/// (webhook or integration event)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRechargeCommand {
    /// Provider-side session reference, e.g. a Stripe payment intent id
    pub provider_reference_id: String,
    /// Terminal state the provider reported
    pub outcome: RechargeStatus,
    /// Amount the provider reported, when the signal carries one
    pub amount: Option<Decimal>,
}

impl CompleteRechargeCommand {
    pub fn new(provider_reference_id: String, outcome: RechargeStatus) -> Self {
        Self {
            provider_reference_id,
            outcome,
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }
}

// =========================================================================
// PayLectureCommand
// =========================================================================

/// Command to pay for a lecture out of the wallet balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayLectureCommand {
    pub wallet_id: Uuid,
    /// Student issuing the purchase; must own the wallet
    pub student_id: Uuid,
    pub lecture_id: Uuid,
    pub amount: Decimal,
}

impl PayLectureCommand {
    pub fn new(wallet_id: Uuid, student_id: Uuid, lecture_id: Uuid, amount: Decimal) -> Self {
        Self {
            wallet_id,
            student_id,
            lecture_id,
            amount,
        }
    }
}

// =========================================================================
// Wallet status commands
// =========================================================================

/// Command to freeze a wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateWalletCommand {
    pub wallet_id: Uuid,
}

impl DeactivateWalletCommand {
    pub fn new(wallet_id: Uuid) -> Self {
        Self { wallet_id }
    }
}

/// Command to unfreeze a wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivateWalletCommand {
    pub wallet_id: Uuid,
}

impl ReactivateWalletCommand {
    pub fn new(wallet_id: Uuid) -> Self {
        Self { wallet_id }
    }
}

// =========================================================================
// Results
// =========================================================================

/// Result of wallet creation; `created = false` means the student already
/// had one and the command was an idempotent no-op
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWalletResult {
    pub wallet_id: Uuid,
    pub student_id: Uuid,
    pub created: bool,
}

/// Result of issuing a recharge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeWalletResult {
    pub recharge_id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: RechargeStatus,
    pub payment_provider: PaymentProvider,
    pub provider_reference_id: String,
    pub client_payment_token: Option<String>,
}

/// Result of resolving a recharge; `applied = false` means the signal was
/// a duplicate or referenced an unknown session, both benign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRechargeResult {
    pub applied: bool,
    pub recharge_id: Option<Uuid>,
}

/// Result of a successful lecture payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayLectureResult {
    pub entry_id: Uuid,
    pub wallet_id: Uuid,
    pub lecture_id: Uuid,
    pub amount: Decimal,
    pub balance: Decimal,
}

/// Result of a wallet status flip; `changed = false` means the wallet was
/// already in the requested state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStatusResult {
    pub wallet_id: Uuid,
    pub is_active: bool,
    pub changed: bool,
}
