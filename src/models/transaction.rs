//! Transaction model
//!
//! Transactions are immutable once committed. A transfer is stored as two
//! linked legs sharing a [`TransferId`]; corrections are new offsetting
//! transactions that point back through `reverses`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, CategoryId, OwnerId, PeriodId, TransactionId, TransferId};
use super::money::Money;

/// Kind of monetary movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::TransferOut | Self::TransferIn)
    }

    /// Whether `amount` carries the sign this kind requires
    pub fn sign_matches(&self, amount: Money) -> bool {
        match self {
            Self::Income | Self::TransferIn => amount.is_positive(),
            Self::Expense | Self::TransferOut => amount.is_negative(),
        }
    }

    /// The kind of the offsetting movement
    pub fn opposite(&self) -> Self {
        match self {
            Self::Income => Self::Expense,
            Self::Expense => Self::Income,
            Self::TransferOut => Self::TransferIn,
            Self::TransferIn => Self::TransferOut,
        }
    }

    /// Parse a simple (non-transfer) kind
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" | "in" => Some(Self::Income),
            "expense" | "out" => Some(Self::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "Income"),
            Self::Expense => write!(f, "Expense"),
            Self::TransferOut => write!(f, "Transfer out"),
            Self::TransferIn => write!(f, "Transfer in"),
        }
    }
}

/// A committed monetary movement on one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner_id: OwnerId,
    pub account_id: AccountId,

    /// Transfers never carry a category
    pub category_id: Option<CategoryId>,

    pub period_id: PeriodId,

    /// Signed amount (positive = inflow, negative = outflow)
    pub amount: Money,

    pub kind: TransactionKind,

    /// Shared by both legs of a transfer
    pub transfer_id: Option<TransferId>,

    /// The transaction this one offsets, if it is a reversal
    pub reverses: Option<TransactionId>,

    #[serde(default)]
    pub memo: String,

    /// Business date of the movement
    pub occurred_at: NaiveDate,

    /// Commit time
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A new income or expense
    pub fn simple(
        owner_id: OwnerId,
        account_id: AccountId,
        category_id: Option<CategoryId>,
        period_id: PeriodId,
        amount: Money,
        kind: TransactionKind,
        occurred_at: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            owner_id,
            account_id,
            category_id,
            period_id,
            amount,
            kind,
            transfer_id: None,
            reverses: None,
            memo: String::new(),
            occurred_at,
            created_at: Utc::now(),
        }
    }

    /// The two legs of a transfer of `amount` (positive) from one account to another
    pub fn transfer_pair(
        owner_id: OwnerId,
        from: AccountId,
        to: AccountId,
        period_id: PeriodId,
        amount: Money,
        occurred_at: NaiveDate,
    ) -> (Self, Self) {
        let transfer_id = TransferId::new();
        let created_at = Utc::now();
        let leg = |account_id, amount, kind| Self {
            id: TransactionId::new(),
            owner_id,
            account_id,
            category_id: None,
            period_id,
            amount,
            kind,
            transfer_id: Some(transfer_id),
            reverses: None,
            memo: String::new(),
            occurred_at,
            created_at,
        };
        (
            leg(from, -amount, TransactionKind::TransferOut),
            leg(to, amount, TransactionKind::TransferIn),
        )
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn reversing(mut self, original: TransactionId) -> Self {
        self.reverses = Some(original);
        self
    }

    pub fn is_transfer(&self) -> bool {
        self.kind.is_transfer()
    }

    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }

    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.amount.is_zero() {
            return Err(TransactionValidationError::ZeroAmount);
        }
        if !self.kind.sign_matches(self.amount) {
            return Err(TransactionValidationError::SignMismatch {
                kind: self.kind,
                amount: self.amount,
            });
        }
        if self.kind.is_transfer() {
            if self.transfer_id.is_none() {
                return Err(TransactionValidationError::UnlinkedTransferLeg);
            }
            if self.category_id.is_some() {
                return Err(TransactionValidationError::CategorizedTransfer);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.occurred_at, self.kind, self.amount)
    }
}

/// Both legs of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub transfer_id: TransferId,
    pub outflow: Transaction,
    pub inflow: Transaction,
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionValidationError {
    #[error("Amount must be non-zero")]
    ZeroAmount,
    #[error("{kind} amount has the wrong sign: {amount}")]
    SignMismatch { kind: TransactionKind, amount: Money },
    #[error("Transfer leg has no transfer id")]
    UnlinkedTransferLeg,
    #[error("Transfer legs cannot carry a category")]
    CategorizedTransfer,
}
