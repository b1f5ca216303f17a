//! Error types for the budget ledger
//!
//! Every engine operation returns [`LedgerResult`]. The variants follow the
//! ledger's failure taxonomy: validation problems are rejected before any
//! mutation, business and period-state violations leave no partial effect,
//! conflicts are transient, and storage failures are surfaced unchanged.

use chrono::NaiveDate;
use thiserror::Error;

/// The main error type for ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input, zero amounts, cross-owner references
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Posting would take an account below zero
    #[error("Insufficient funds in account '{account}': need {needed}, have {available}")]
    InsufficientFunds {
        account: String,
        needed: i64,
        available: i64,
    },

    /// The date resolves into a period that has already been closed
    #[error("Period {period} is closed")]
    PeriodClosed { period: String },

    /// No period covers the date
    #[error("No open period covers {date}")]
    NoOpenPeriod { date: NaiveDate },

    /// Close was requested for a period that is not open
    #[error("Period {period} is already closed")]
    PeriodAlreadyClosed { period: String },

    /// Close was requested before the period's month has ended
    #[error("Period {period} has not elapsed (ends {end_date})")]
    PeriodNotElapsed { period: String, end_date: NaiveDate },

    /// Lock acquisition gave up; the caller should retry
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The durable store failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Cached state disagrees with history
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Account",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for categories
    pub fn category_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Category",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for periods
    pub fn period_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Period",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Validation-class errors: rejected before any mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Duplicate { .. }
        )
    }

    /// Period state-machine violations
    pub fn is_period_state(&self) -> bool {
        matches!(
            self,
            Self::PeriodClosed { .. }
                | Self::NoOpenPeriod { .. }
                | Self::PeriodAlreadyClosed { .. }
                | Self::PeriodNotElapsed { .. }
        )
    }

    /// Whether the caller should retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::Validation("amount must be non-zero".into());
        assert_eq!(err.to_string(), "Validation error: amount must be non-zero");
    }

    #[test]
    fn test_not_found_error() {
        let err = LedgerError::account_not_found("Checking");
        assert_eq!(err.to_string(), "Account not found: Checking");
        assert!(err.is_not_found());
        assert!(err.is_validation());
    }

    #[test]
    fn test_insufficient_funds_error() {
        let err = LedgerError::InsufficientFunds {
            account: "Checking".into(),
            needed: 50000,
            available: 30000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in account 'Checking': need 50000, have 30000"
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn test_classification() {
        assert!(LedgerError::ConcurrencyConflict("busy".into()).is_transient());
        assert!(!LedgerError::StorageUnavailable("disk".into()).is_transient());
        assert!(LedgerError::PeriodAlreadyClosed {
            period: "2025-01".into()
        }
        .is_period_state());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LedgerError = io_err.into();
        assert!(matches!(err, LedgerError::StorageUnavailable(_)));
    }
}
