//! Account model
//!
//! An account's `balance` is a cache of the sum of every committed
//! transaction that touches it. It is only ever changed through
//! [`Account::apply`], called from the posting path while the account's lock
//! is held.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, OwnerId};
use super::money::Money;

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    #[default]
    Checking,
    Savings,
}

impl AccountKind {
    /// Parse account kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "checking" => Some(Self::Checking),
            "savings" => Some(Self::Savings),
            _ => None,
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking"),
            Self::Savings => write!(f, "Savings"),
        }
    }
}

/// A user's account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: OwnerId,
    pub name: String,
    pub kind: AccountKind,

    /// Cached sum of committed transactions
    pub balance: Money,

    /// Whether postings may take the balance below zero
    pub allow_negative: bool,

    /// Soft-closed accounts reject new postings
    #[serde(default)]
    pub closed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new, empty account
    pub fn new(owner_id: OwnerId, name: impl Into<String>, kind: AccountKind) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            owner_id,
            name: name.into(),
            kind,
            balance: Money::ZERO,
            allow_negative: false,
            closed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style toggle for overdraft permission
    pub fn allowing_negative(mut self, allow_negative: bool) -> Self {
        self.allow_negative = allow_negative;
        self
    }

    /// Balance after applying `delta`, if the account's rules permit it
    pub fn balance_after(&self, delta: Money) -> Result<Money, PostingRejection> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(PostingRejection::Overflow)?;
        if next.is_negative() && !self.allow_negative {
            return Err(PostingRejection::WouldGoNegative {
                needed: delta.saturating_abs(),
                available: self.balance,
            });
        }
        Ok(next)
    }

    /// Apply a delta to the cached balance
    pub fn apply(&mut self, delta: Money) -> Result<(), PostingRejection> {
        self.balance = self.balance_after(delta)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Soft-close the account
    pub fn close(&mut self) {
        self.closed = true;
        self.updated_at = Utc::now();
    }

    /// Validate the account
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.name.trim().is_empty() {
            return Err(AccountValidationError::EmptyName);
        }
        if self.name.len() > 100 {
            return Err(AccountValidationError::NameTooLong(self.name.len()));
        }
        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Why a delta could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingRejection {
    WouldGoNegative { needed: Money, available: Money },
    Overflow,
}

/// Validation errors for accounts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountValidationError {
    #[error("Account name cannot be empty")]
    EmptyName,
    #[error("Account name too long ({0} chars, max 100)")]
    NameTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checking() -> Account {
        Account::new(OwnerId::new(), "Checking", AccountKind::Checking)
    }

    #[test]
    fn test_new_account_is_empty() {
        let account = checking();
        assert_eq!(account.balance, Money::ZERO);
        assert!(!account.allow_negative);
        assert!(!account.closed);
    }

    #[test]
    fn test_apply_rejects_negative_without_overdraft() {
        let mut account = checking();
        account.apply(Money::from_minor(30000)).unwrap();

        let err = account.apply(Money::from_minor(-50000)).unwrap_err();
        assert_eq!(
            err,
            PostingRejection::WouldGoNegative {
                needed: Money::from_minor(50000),
                available: Money::from_minor(30000),
            }
        );
        assert_eq!(account.balance, Money::from_minor(30000));
    }

    #[test]
    fn test_apply_allows_negative_with_overdraft() {
        let mut account = checking().allowing_negative(true);
        account.apply(Money::from_minor(-100)).unwrap();
        assert_eq!(account.balance, Money::from_minor(-100));
    }

    #[test]
    fn test_apply_to_exactly_zero_is_fine() {
        let mut account = checking();
        account.apply(Money::from_minor(500)).unwrap();
        account.apply(Money::from_minor(-500)).unwrap();
        assert!(account.balance.is_zero());
    }

    #[test]
    fn test_validation() {
        let mut account = checking();
        assert!(account.validate().is_ok());
        account.name = "  ".into();
        assert_eq!(account.validate(), Err(AccountValidationError::EmptyName));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(AccountKind::parse("SAVINGS"), Some(AccountKind::Savings));
        assert_eq!(AccountKind::parse("credit"), None);
    }
}
