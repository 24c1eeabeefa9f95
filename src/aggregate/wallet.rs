//! Wallet Aggregate
//!
//! Wallet is the core aggregate for a student's balance. Every balance
//! change produces a ledger entry and a domain event together, so the
//! audit trail and the published facts can never drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{DomainError, Money, WalletEvent};

use super::Aggregate;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            other => Err(DomainError::InvalidReference(format!(
                "unknown entry type '{other}'"
            ))),
        }
    }
}

/// What caused a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Recharge,
    LecturePayment,
    Adjustment,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSource::Recharge => "recharge",
            TransactionSource::LecturePayment => "lecture_payment",
            TransactionSource::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recharge" => Ok(TransactionSource::Recharge),
            "lecture_payment" => Ok(TransactionSource::LecturePayment),
            "adjustment" => Ok(TransactionSource::Adjustment),
            other => Err(DomainError::InvalidReference(format!(
                "unknown transaction source '{other}'"
            ))),
        }
    }
}

/// A single immutable line in a wallet's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletLedgerEntry {
    id: Uuid,
    wallet_id: Uuid,
    amount: Money,
    entry_type: TransactionType,
    source: TransactionSource,
    /// The recharge or lecture this entry settles
    reference_id: Uuid,
    created_at: DateTime<Utc>,
}

impl WalletLedgerEntry {
    /// Record money flowing into a wallet
    pub fn credit(
        wallet_id: Uuid,
        amount: Money,
        source: TransactionSource,
        reference_id: Uuid,
    ) -> Result<Self, DomainError> {
        Self::new(wallet_id, amount, TransactionType::Credit, source, reference_id)
    }

    /// Record money flowing out of a wallet
    pub fn debit(
        wallet_id: Uuid,
        amount: Money,
        source: TransactionSource,
        reference_id: Uuid,
    ) -> Result<Self, DomainError> {
        Self::new(wallet_id, amount, TransactionType::Debit, source, reference_id)
    }

    fn new(
        wallet_id: Uuid,
        amount: Money,
        entry_type: TransactionType,
        source: TransactionSource,
        reference_id: Uuid,
    ) -> Result<Self, DomainError> {
        if wallet_id.is_nil() {
            return Err(DomainError::InvalidReference(
                "ledger entry requires a wallet id".to_string(),
            ));
        }
        if reference_id.is_nil() {
            return Err(DomainError::InvalidReference(
                "ledger entry requires a reference id".to_string(),
            ));
        }
        // Zero-value entries carry no information and are rejected
        if !amount.is_positive() {
            return Err(DomainError::InvalidAmount(
                "ledger entry amount must be positive".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            wallet_id,
            amount,
            entry_type,
            source,
            reference_id,
            created_at: Utc::now(),
        })
    }

    /// Rebuild an entry from its database row
    #[allow(clippy::too_many_arguments)]
    pub fn from_db_state(
        id: Uuid,
        wallet_id: Uuid,
        amount: Money,
        entry_type: TransactionType,
        source: TransactionSource,
        reference_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            wallet_id,
            amount,
            entry_type,
            source,
            reference_id,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn wallet_id(&self) -> Uuid {
        self.wallet_id
    }

    pub fn amount(&self) -> &Money {
        &self.amount
    }

    pub fn entry_type(&self) -> TransactionType {
        self.entry_type
    }

    pub fn source(&self) -> TransactionSource {
        self.source
    }

    pub fn reference_id(&self) -> Uuid {
        self.reference_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Wallet Aggregate
///
/// Holds a student's balance in one currency. Commands mutate the wallet in
/// memory and return the ledger entry plus the event describing the change;
/// the caller persists all three together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    id: Uuid,
    student_id: Uuid,
    balance: Money,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Wallet {
    // =========================================================================
    // Wallet::create()
    // =========================================================================

    /// Open a wallet for a student with a zero balance
    pub fn create(student_id: Uuid, currency: &str) -> Result<(Self, WalletEvent), DomainError> {
        if student_id.is_nil() {
            return Err(DomainError::InvalidReference(
                "wallet requires a student id".to_string(),
            ));
        }

        let now = Utc::now();
        let wallet = Self {
            id: Uuid::new_v4(),
            student_id,
            balance: Money::zero(currency)?,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let event = WalletEvent::WalletCreated {
            wallet_id: wallet.id,
            student_id,
        };

        Ok((wallet, event))
    }

    /// Rebuild a wallet from its database row
    pub fn from_db_state(
        id: Uuid,
        student_id: Uuid,
        balance: Money,
        is_active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id,
            balance,
            is_active,
            created_at,
            updated_at,
        }
    }

    // =========================================================================
    // Wallet::credit()
    // =========================================================================

    /// Add money to the wallet.
    /// Returns the ledger entry and the event to be persisted together.
    pub fn credit(
        &mut self,
        amount: Money,
        source: TransactionSource,
        reference_id: Uuid,
    ) -> Result<(WalletLedgerEntry, WalletEvent), DomainError> {
        self.ensure_active()?;

        let entry = WalletLedgerEntry::credit(self.id, amount.clone(), source, reference_id)?;
        self.balance = self.balance.checked_add(&amount)?;
        self.updated_at = Utc::now();

        let event = WalletEvent::WalletCredited {
            wallet_id: self.id,
            amount,
        };

        Ok((entry, event))
    }

    // =========================================================================
    // Wallet::debit()
    // =========================================================================

    /// Take money out of the wallet.
    /// Fails without touching state when the balance cannot cover the amount.
    pub fn debit(
        &mut self,
        amount: Money,
        source: TransactionSource,
        reference_id: Uuid,
    ) -> Result<(WalletLedgerEntry, WalletEvent), DomainError> {
        self.ensure_active()?;

        if self.balance.currency() != amount.currency() {
            return Err(DomainError::CurrencyMismatch {
                left: self.balance.currency().to_string(),
                right: amount.currency().to_string(),
            });
        }

        if !self.balance.covers(&amount) {
            return Err(DomainError::insufficient_balance(
                amount.amount(),
                self.balance.amount(),
            ));
        }

        let entry = WalletLedgerEntry::debit(self.id, amount.clone(), source, reference_id)?;
        self.balance = self.balance.checked_sub(&amount)?;
        self.updated_at = Utc::now();

        let event = WalletEvent::WalletDebited {
            wallet_id: self.id,
            amount,
            reference_id,
        };

        Ok((entry, event))
    }

    /// Deactivate the wallet; funds stay frozen in place
    pub fn deactivate(&mut self) -> Result<WalletEvent, DomainError> {
        if !self.is_active {
            return Err(DomainError::BusinessRuleViolation(
                "Wallet is already deactivated".to_string(),
            ));
        }

        self.is_active = false;
        self.updated_at = Utc::now();

        Ok(WalletEvent::WalletDeactivated { wallet_id: self.id })
    }

    /// Reactivate a deactivated wallet
    pub fn reactivate(&mut self) -> Result<WalletEvent, DomainError> {
        if self.is_active {
            return Err(DomainError::BusinessRuleViolation(
                "Wallet is already active".to_string(),
            ));
        }

        self.is_active = true;
        self.updated_at = Utc::now();

        Ok(WalletEvent::WalletReactivated { wallet_id: self.id })
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.is_active {
            return Err(DomainError::WalletNotActive);
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn student_id(&self) -> Uuid {
        self.student_id
    }

    pub fn balance(&self) -> &Money {
        &self.balance
    }

    pub fn currency(&self) -> &str {
        self.balance.currency()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Aggregate for Wallet {
    fn aggregate_type() -> &'static str {
        "Wallet"
    }

    fn id(&self) -> Uuid {
        self.id
    }
}
