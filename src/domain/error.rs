//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Insufficient balance for debit operation
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// Wallet is deactivated and cannot move funds
    #[error("Wallet is not active")]
    WalletNotActive,

    /// Invalid amount (negative, wrong scale, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid identifier or reference passed to a domain operation
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Operation not allowed in the current recharge status
    #[error("Recharge in status '{status}' cannot be {action}")]
    InvalidStateTransition { status: String, action: String },

    /// Provider reference on the notification does not match the recharge
    #[error("Provider reference mismatch: got '{provided}'")]
    ReferenceMismatch { provided: String },

    /// Currencies of the operands disagree
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    /// Business rule violation
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),
}

impl DomainError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    ) -> Self {
        Self::InsufficientBalance { required, available }
    }

    /// Create an invalid state transition error
    pub fn invalid_transition(status: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            status: status.into(),
            action: action.into(),
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::WalletNotActive
                | Self::InvalidAmount(_)
                | Self::InvalidReference(_)
                | Self::CurrencyMismatch { .. }
                | Self::BusinessRuleViolation(_)
        )
    }

    /// Check if this is a conflict error (state moved underneath the caller)
    pub fn is_conflict_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidStateTransition { .. } | Self::ReferenceMismatch { .. }
        )
    }
}

impl From<crate::domain::MoneyError> for DomainError {
    fn from(err: crate::domain::MoneyError) -> Self {
        match err {
            crate::domain::MoneyError::CurrencyMismatch { left, right } => {
                Self::CurrencyMismatch { left, right }
            }
            other => Self::InvalidAmount(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_insufficient_balance_error() {
        let err = DomainError::insufficient_balance(
            Decimal::new(100, 0),
            Decimal::new(50, 0),
        );

        assert!(err.is_client_error());
        assert!(!err.is_conflict_error());
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = DomainError::invalid_transition("completed", "completed again");

        assert!(!err.is_client_error());
        assert!(err.is_conflict_error());
        assert!(err.to_string().contains("completed"));
    }

    #[test]
    fn test_money_error_mapping() {
        let mismatch: DomainError = crate::domain::MoneyError::CurrencyMismatch {
            left: "EGP".to_string(),
            right: "USD".to_string(),
        }
        .into();
        assert!(matches!(mismatch, DomainError::CurrencyMismatch { .. }));

        let negative: DomainError =
            crate::domain::MoneyError::Negative(Decimal::new(-1, 0)).into();
        assert!(matches!(negative, DomainError::InvalidAmount(_)));
    }
}
