//! Money type
//!
//! Domain primitive for monetary values with business rule validation.
//! Every `Money` is validated at construction time, so an invalid amount or
//! currency cannot exist anywhere in the system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum allowed value (keeps NUMERIC(18, 2) columns safe)
const MAX_AMOUNT: &str = "1000000000000";

/// Monetary amounts carry exactly 2 decimal places
const SCALE: u32 = 2;

/// Money represents a validated monetary value in a single currency.
///
/// # Invariants
/// - Amount is never negative (zero is allowed)
/// - Amount carries exactly 2 decimal places after construction
/// - Currency is a 3-letter ASCII code, stored uppercase
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use student_wallet::domain::Money;
///
/// let money = Money::new(Decimal::new(50, 0), "egp").unwrap();
/// assert_eq!(money.to_string(), "50.00 EGP");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMoney", into = "RawMoney")]
pub struct Money {
    amount: Decimal,
    currency: String,
}

/// Wire shape for Money; validation happens in `TryFrom`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMoney {
    pub amount: Decimal,
    pub currency: String,
}

/// Errors that can occur when creating or combining Money
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

impl Money {
    /// Create a new Money value with validation.
    ///
    /// # Errors
    /// - `MoneyError::Negative` if amount < 0
    /// - `MoneyError::TooManyDecimals` if more than 2 decimal places
    /// - `MoneyError::Overflow` if amount > 1 trillion
    /// - `MoneyError::InvalidCurrency` if the code is not 3 ASCII letters
    pub fn new(amount: Decimal, currency: &str) -> Result<Self, MoneyError> {
        // Rule 1: Never negative
        if amount < Decimal::ZERO {
            return Err(MoneyError::Negative(amount));
        }

        // Rule 2: At most 2 decimal places on input
        if amount.scale() > SCALE {
            return Err(MoneyError::TooManyDecimals(amount.scale()));
        }

        // Rule 3: Column-safe maximum
        let max = Decimal::from_str(MAX_AMOUNT).map_err(|_| MoneyError::Overflow)?;
        if amount > max {
            return Err(MoneyError::Overflow);
        }

        // Rule 4: Currency is a 3-letter ASCII code
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(currency.to_string()));
        }

        // Normalize: exactly 2 decimal places, uppercase currency
        let mut amount = amount;
        amount.rescale(SCALE);

        Ok(Self {
            amount,
            currency: currency.to_ascii_uppercase(),
        })
    }

    /// Zero value in the given currency.
    pub fn zero(currency: &str) -> Result<Self, MoneyError> {
        Self::new(Decimal::ZERO, currency)
    }

    /// Get the amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Get the currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Check whether this value can pay for `other` (same currency, enough funds).
    pub fn covers(&self, other: &Money) -> bool {
        self.currency == other.currency && self.amount >= other.amount
    }

    /// Add another Money of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Money::new(self.amount + other.amount, &self.currency)
    }

    /// Subtract another Money of the same currency.
    /// A result below zero is rejected; callers check `covers` first when
    /// they want a richer error.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Money::new(self.amount - other.amount, &self.currency)
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl TryFrom<RawMoney> for Money {
    type Error = MoneyError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, &raw.currency)
    }
}

impl From<Money> for RawMoney {
    fn from(money: Money) -> Self {
        RawMoney {
            amount: money.amount,
            currency: money.currency,
        }
    }
}
