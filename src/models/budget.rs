//! Budget items, category summaries and rollover records
//!
//! A [`BudgetItem`] is the per-(period, category) allocation row. Actual
//! spending is never stored on it; summaries combine the item with the
//! category's activity for the period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::RolloverPolicy;
use super::ids::{BudgetItemId, CategoryId, PeriodId};
use super::money::Money;

/// Allocation for one category in one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetItem {
    pub id: BudgetItemId,
    pub period_id: PeriodId,
    pub category_id: CategoryId,

    /// Amount budgeted this period
    pub allocated: Money,

    /// Carried in from the previous period (may be negative)
    pub rolled_in: Money,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BudgetItem {
    /// An empty item (`allocated = 0`, `rolled_in = 0`)
    pub fn new(period_id: PeriodId, category_id: CategoryId) -> Self {
        let now = Utc::now();
        Self {
            id: BudgetItemId::new(),
            period_id,
            category_id,
            allocated: Money::ZERO,
            rolled_in: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_allocated(&mut self, amount: Money) {
        self.allocated = amount;
        self.updated_at = Utc::now();
    }

    /// Add a carry; the item is left unchanged if `rolled_in` would overflow
    pub fn add_rolled_in(&mut self, amount: Money) -> Result<(), BudgetValidationError> {
        self.rolled_in = self
            .rolled_in
            .checked_add(amount)
            .ok_or(BudgetValidationError::RolledInOverflow)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn validate(&self) -> Result<(), BudgetValidationError> {
        if self.allocated.is_negative() {
            return Err(BudgetValidationError::NegativeAllocation);
        }
        Ok(())
    }
}

impl fmt::Display for BudgetItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocated: {} (rolled in: {})",
            self.allocated, self.rolled_in
        )
    }
}

/// Income and expense magnitudes for one category in one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryActivity {
    pub income: Money,
    pub expense: Money,
}

impl CategoryActivity {
    /// The counters with `amount` folded in, or `None` if either would
    /// overflow
    pub fn checked_record(&self, amount: Money) -> Option<Self> {
        let mut next = *self;
        if amount.is_negative() {
            next.expense = next.expense.checked_add(amount.checked_neg()?)?;
        } else {
            next.income = next.income.checked_add(amount)?;
        }
        Some(next)
    }

    /// Fold a signed category amount into the counters
    ///
    /// Saturates instead of overflowing. Commits reject amounts that would
    /// saturate, so this only matters for hand-edited snapshots.
    pub fn record(&mut self, amount: Money) {
        if amount.is_negative() {
            self.expense = self.expense.saturating_add(amount.saturating_abs());
        } else {
            self.income = self.income.saturating_add(amount);
        }
    }

    /// Net spending: expenses minus income (refunds)
    pub fn actual(&self) -> Money {
        self.expense - self.income
    }
}

/// Allocated-vs-actual figures for one category in one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category_id: CategoryId,
    pub period_id: PeriodId,
    pub allocated: Money,
    pub rolled_in: Money,
    pub income: Money,
    pub expense: Money,
    pub actual: Money,

    /// `allocated + rolled_in - actual`; negative means overspent
    pub remaining: Money,
}

impl CategorySummary {
    pub fn new(
        category_id: CategoryId,
        period_id: PeriodId,
        allocated: Money,
        rolled_in: Money,
        activity: CategoryActivity,
    ) -> Self {
        let actual = activity.actual();
        Self {
            category_id,
            period_id,
            allocated,
            rolled_in,
            income: activity.income,
            expense: activity.expense,
            actual,
            remaining: allocated.saturating_add(rolled_in).saturating_sub(actual),
        }
    }

    pub fn is_overspent(&self) -> bool {
        self.remaining.is_negative()
    }
}

impl fmt::Display for CategorySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Allocated: {} | Rolled in: {} | Actual: {} | Remaining: {}",
            self.allocated, self.rolled_in, self.actual, self.remaining
        )
    }
}

/// Proof that one (closing period, category) rollover has been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverRecord {
    pub from_period_id: PeriodId,
    pub to_period_id: PeriodId,
    pub category_id: CategoryId,
    pub policy: RolloverPolicy,
    pub remaining: Money,
    pub carried: Money,
    pub applied_at: DateTime<Utc>,
}

/// Validation errors for budget items
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BudgetValidationError {
    #[error("Allocated amount cannot be negative")]
    NegativeAllocation,
    #[error("Rolled-in amount is out of range")]
    RolledInOverflow,
}
