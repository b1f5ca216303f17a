//! Category budget tracker
//!
//! Summaries are served from the transaction repository's incrementally
//! maintained counters. [`BudgetService::recompute_summary`] derives the same
//! figures from raw transactions and is what the counters are checked
//! against.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    AccountId, AccountKind, BudgetItem, BudgetPeriod, Category, CategoryActivity, CategoryId,
    CategorySummary, Money, OwnerId, PeriodId,
};
use crate::storage::{Changeset, Storage};

use super::category::CategoryService;
use super::locks::LockManager;

/// One category's line in a period overview
#[derive(Debug, Clone)]
pub struct BudgetLine {
    pub category: Category,
    pub summary: CategorySummary,
}

/// Every category of an owner for one period, plus totals
#[derive(Debug, Clone)]
pub struct BudgetOverview {
    pub period: BudgetPeriod,
    pub lines: Vec<BudgetLine>,
    pub total_allocated: Money,
    pub total_rolled_in: Money,
    pub total_actual: Money,
    pub total_remaining: Money,
}

impl BudgetOverview {
    pub fn overspent(&self) -> impl Iterator<Item = &BudgetLine> {
        self.lines.iter().filter(|l| l.summary.is_overspent())
    }
}

/// Money set aside for one category and drawn from savings, across every
/// period
///
/// Expenses booked to the category from checking accounts fund it; expenses
/// booked from savings accounts spend it. Income in either place counts
/// against the same side, so reversals net out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavingsBalance {
    pub category: Category,
    pub funded: Money,
    pub spent: Money,
    /// `funded - spent`
    pub available: Money,
}

#[derive(Default)]
struct SavingsTally {
    funded: Money,
    spent: Money,
    drawn_from_savings: bool,
}

fn tally_savings(storage: &Storage, owner_id: OwnerId) -> LedgerResult<HashMap<CategoryId, SavingsTally>> {
    let savings: HashSet<AccountId> = storage
        .accounts
        .for_owner(owner_id)?
        .into_iter()
        .filter(|a| a.kind == AccountKind::Savings)
        .map(|a| a.id)
        .collect();
    let overflow = || LedgerError::InvariantViolation("savings totals overflow".into());

    let mut tallies: HashMap<CategoryId, SavingsTally> = HashMap::new();
    for txn in storage.transactions.for_owner(owner_id)? {
        let category_id = match txn.category_id {
            Some(id) if !txn.is_transfer() => id,
            _ => continue,
        };
        let outflow = txn.amount.checked_neg().ok_or_else(overflow)?;
        let tally = tallies.entry(category_id).or_default();
        if savings.contains(&txn.account_id) {
            tally.spent = tally.spent.checked_add(outflow).ok_or_else(overflow)?;
            tally.drawn_from_savings = true;
        } else {
            tally.funded = tally.funded.checked_add(outflow).ok_or_else(overflow)?;
        }
    }
    Ok(tallies)
}

fn savings_balance_of(category: Category, tally: Option<&SavingsTally>) -> LedgerResult<SavingsBalance> {
    let (funded, spent) = tally.map_or((Money::ZERO, Money::ZERO), |t| (t.funded, t.spent));
    let available = funded.checked_sub(spent).ok_or_else(|| {
        LedgerError::InvariantViolation(format!("savings balance of '{}' overflows", category.name))
    })?;
    Ok(SavingsBalance {
        category,
        funded,
        spent,
        available,
    })
}

/// Service for budget allocations and summaries
pub struct BudgetService<'a> {
    storage: &'a Storage,
    locks: &'a LockManager,
}

impl<'a> BudgetService<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockManager) -> Self {
        Self { storage, locks }
    }

    fn owned_period(&self, owner_id: OwnerId, period_id: PeriodId) -> LedgerResult<BudgetPeriod> {
        let period = self
            .storage
            .periods
            .get(period_id)?
            .ok_or_else(|| LedgerError::period_not_found(period_id.to_string()))?;
        if period.owner_id != owner_id {
            return Err(LedgerError::Validation(format!(
                "period {} belongs to another owner",
                period_id
            )));
        }
        Ok(period)
    }

    fn owned_category(&self, owner_id: OwnerId, category_id: CategoryId) -> LedgerResult<Category> {
        let category = self
            .storage
            .categories
            .get(category_id)?
            .ok_or_else(|| LedgerError::category_not_found(category_id.to_string()))?;
        if category.owner_id != owner_id {
            return Err(LedgerError::Validation(format!(
                "category {} belongs to another owner",
                category_id
            )));
        }
        Ok(category)
    }

    /// Figures for one category from its budget item and the live counters
    ///
    /// No ownership checks; callers have already resolved both ids.
    pub(crate) fn summary_unchecked(
        &self,
        period_id: PeriodId,
        category_id: CategoryId,
    ) -> LedgerResult<CategorySummary> {
        let item = self.storage.budget.get(period_id, category_id)?;
        let (allocated, rolled_in) = item
            .map(|i| (i.allocated, i.rolled_in))
            .unwrap_or((Money::ZERO, Money::ZERO));
        let activity = self.storage.transactions.activity(period_id, category_id)?;
        Ok(CategorySummary::new(
            category_id,
            period_id,
            allocated,
            rolled_in,
            activity,
        ))
    }

    /// Allocated-vs-actual for one category in one period
    pub fn summary(
        &self,
        owner_id: OwnerId,
        period_id: PeriodId,
        category_id: CategoryId,
    ) -> LedgerResult<CategorySummary> {
        self.owned_period(owner_id, period_id)?;
        self.owned_category(owner_id, category_id)?;
        self.summary_unchecked(period_id, category_id)
    }

    /// The same figures as [`summary`](Self::summary), rebuilt from raw
    /// transactions
    pub fn recompute_summary(
        &self,
        owner_id: OwnerId,
        period_id: PeriodId,
        category_id: CategoryId,
    ) -> LedgerResult<CategorySummary> {
        self.owned_period(owner_id, period_id)?;
        self.owned_category(owner_id, category_id)?;

        let mut activity = CategoryActivity::default();
        for txn in self.storage.transactions.for_period(period_id)? {
            if txn.category_id == Some(category_id) && !txn.is_transfer() {
                activity.record(txn.amount);
            }
        }

        let item = self.storage.budget.get(period_id, category_id)?;
        let (allocated, rolled_in) = item
            .map(|i| (i.allocated, i.rolled_in))
            .unwrap_or((Money::ZERO, Money::ZERO));
        Ok(CategorySummary::new(
            category_id,
            period_id,
            allocated,
            rolled_in,
            activity,
        ))
    }

    /// Summaries for every category of the owner, ordered by category name
    pub fn summaries(&self, owner_id: OwnerId, period_id: PeriodId) -> LedgerResult<Vec<CategorySummary>> {
        Ok(self
            .overview(owner_id, period_id)?
            .lines
            .into_iter()
            .map(|l| l.summary)
            .collect())
    }

    /// A consistent view of one period's budget
    pub fn overview(&self, owner_id: OwnerId, period_id: PeriodId) -> LedgerResult<BudgetOverview> {
        let period = self.owned_period(owner_id, period_id)?;

        self.storage.consistent(|storage| {
            let mut lines = Vec::new();
            for category in storage.categories.for_owner(owner_id)? {
                let summary = self.summary_unchecked(period_id, category.id)?;
                lines.push(BudgetLine { category, summary });
            }

            let total = |f: fn(&CategorySummary) -> Money| -> Money {
                lines.iter().map(|l| f(&l.summary)).sum()
            };
            Ok(BudgetOverview {
                total_allocated: total(|s| s.allocated),
                total_rolled_in: total(|s| s.rolled_in),
                total_actual: total(|s| s.actual),
                total_remaining: total(|s| s.remaining),
                period,
                lines,
            })
        })
    }

    /// Savings balance of one category; zero if it was never funded
    pub fn savings_balance(&self, owner_id: OwnerId, category_id: CategoryId) -> LedgerResult<SavingsBalance> {
        let category = self.owned_category(owner_id, category_id)?;
        self.storage.consistent(|storage| {
            let tallies = tally_savings(storage, owner_id)?;
            savings_balance_of(category, tallies.get(&category_id))
        })
    }

    /// Savings balances of every category that savings accounts have paid
    /// for, ordered by category name
    pub fn savings_balances(&self, owner_id: OwnerId) -> LedgerResult<Vec<SavingsBalance>> {
        self.storage.consistent(|storage| {
            let tallies = tally_savings(storage, owner_id)?;
            storage
                .categories
                .for_owner(owner_id)?
                .into_iter()
                .filter_map(|category| {
                    let tally = tallies.get(&category.id).filter(|t| t.drawn_from_savings)?;
                    Some(savings_balance_of(category, Some(tally)))
                })
                .collect()
        })
    }

    /// Create or update a category's allocation in an open period
    pub fn set_allocation(
        &self,
        owner_id: OwnerId,
        period_id: PeriodId,
        category_id: CategoryId,
        allocated: Money,
    ) -> LedgerResult<BudgetItem> {
        if allocated.is_negative() {
            return Err(LedgerError::Validation(
                "allocated amount cannot be negative".into(),
            ));
        }
        self.owned_period(owner_id, period_id)?;
        let categories = CategoryService::new(self.storage, self.locks);
        categories.active(owner_id, category_id)?;

        let item = self.locks.shared(owner_id, || {
            self.locks.with_category(category_id, || {
                // Re-read under the gate: a close or an archive may have
                // just finished
                let period = self.owned_period(owner_id, period_id)?;
                if !period.is_open() {
                    return Err(LedgerError::PeriodClosed {
                        period: period.month.to_string(),
                    });
                }
                categories.active(owner_id, category_id)?;

                let mut item = self
                    .storage
                    .budget
                    .get(period_id, category_id)?
                    .unwrap_or_else(|| BudgetItem::new(period_id, category_id));
                item.set_allocated(allocated);
                item.validate()
                    .map_err(|e| LedgerError::Validation(e.to_string()))?;

                let mut changes = Changeset::new();
                changes.put_budget_item(item.clone());
                self.storage.commit(changes)?;
                Ok(item)
            })
        })?;

        info!(period = %period_id, category = %category_id, allocated = %allocated, "allocation set");
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockSettings;
    use crate::models::{Month, RolloverPolicy};

    struct Fixture {
        storage: Storage,
        locks: LockManager,
        owner: OwnerId,
        period: BudgetPeriod,
        groceries: Category,
    }

    fn fixture() -> Fixture {
        let storage = Storage::in_memory();
        let owner = OwnerId::new();
        let period = BudgetPeriod::open(owner, Month::new(2025, 1).unwrap());
        let groceries = Category::new(owner, "Groceries", RolloverPolicy::CarryUnspent);
        let mut changes = Changeset::new();
        changes.put_period(period.clone()).put_category(groceries.clone());
        storage.commit(changes).unwrap();
        Fixture {
            storage,
            locks: LockManager::new(LockSettings::default()),
            owner,
            period,
            groceries,
        }
    }

    #[test]
    fn test_summary_without_item_is_zero() {
        let f = fixture();
        let service = BudgetService::new(&f.storage, &f.locks);
        let summary = service.summary(f.owner, f.period.id, f.groceries.id).unwrap();
        assert_eq!(summary.allocated, Money::ZERO);
        assert_eq!(summary.remaining, Money::ZERO);
    }

    #[test]
    fn test_set_allocation_upserts() {
        let f = fixture();
        let service = BudgetService::new(&f.storage, &f.locks);

        let first = service
            .set_allocation(f.owner, f.period.id, f.groceries.id, Money::from_minor(100000))
            .unwrap();
        let second = service
            .set_allocation(f.owner, f.period.id, f.groceries.id, Money::from_minor(150000))
            .unwrap();
        assert_eq!(first.id, second.id);

        let summary = service.summary(f.owner, f.period.id, f.groceries.id).unwrap();
        assert_eq!(summary.allocated, Money::from_minor(150000));
        assert_eq!(f.storage.budget.for_period(f.period.id).unwrap().len(), 1);
    }

    #[test]
    fn test_negative_allocation_rejected() {
        let f = fixture();
        let service = BudgetService::new(&f.storage, &f.locks);
        let err = service
            .set_allocation(f.owner, f.period.id, f.groceries.id, Money::from_minor(-1))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_closed_period_rejects_allocation() {
        let f = fixture();
        let mut closed = f.period.clone();
        closed.close();
        let mut changes = Changeset::new();
        changes.put_period(closed);
        f.storage.commit(changes).unwrap();

        let service = BudgetService::new(&f.storage, &f.locks);
        let err = service
            .set_allocation(f.owner, f.period.id, f.groceries.id, Money::from_minor(100))
            .unwrap_err();
        assert!(matches!(err, LedgerError::PeriodClosed { .. }));
    }

    #[test]
    fn test_other_owner_cannot_read_summary() {
        let f = fixture();
        let service = BudgetService::new(&f.storage, &f.locks);
        let err = service
            .summary(OwnerId::new(), f.period.id, f.groceries.id)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_archived_category_takes_no_allocation() {
        let f = fixture();
        let service = BudgetService::new(&f.storage, &f.locks);
        service
            .set_allocation(f.owner, f.period.id, f.groceries.id, Money::from_minor(5000))
            .unwrap();
        CategoryService::new(&f.storage, &f.locks)
            .archive(f.owner, f.groceries.id)
            .unwrap();

        let err = service
            .set_allocation(f.owner, f.period.id, f.groceries.id, Money::from_minor(9000))
            .unwrap_err();
        assert!(err.is_validation());

        // Its line stays in the period overview
        let overview = service.overview(f.owner, f.period.id).unwrap();
        assert_eq!(overview.lines.len(), 1);
        assert_eq!(overview.total_allocated, Money::from_minor(5000));
    }

    #[test]
    fn test_savings_balances() {
        use crate::models::{Account, AccountKind, Transaction, TransactionKind};

        let f = fixture();
        let vacation = Category::new(f.owner, "Vacation", RolloverPolicy::CarryBoth);
        let mut checking = Account::new(f.owner, "Checking", AccountKind::Checking).allowing_negative(true);
        let mut savings = Account::new(f.owner, "Savings", AccountKind::Savings).allowing_negative(true);
        let day = f.period.start_date;
        let post = |account: &mut Account, category: &Category, minor: i64| {
            let kind = if minor < 0 { TransactionKind::Expense } else { TransactionKind::Income };
            let txn = Transaction::simple(
                f.owner,
                account.id,
                Some(category.id),
                f.period.id,
                Money::from_minor(minor),
                kind,
                day,
            );
            account.apply(txn.amount).unwrap();
            txn
        };

        let mut changes = Changeset::new();
        changes
            .put_category(vacation.clone())
            .insert_transaction(post(&mut checking, &vacation, -50000))
            .insert_transaction(post(&mut checking, &vacation, -20000))
            .insert_transaction(post(&mut savings, &vacation, -30000))
            .insert_transaction(post(&mut savings, &vacation, 5000))
            // Groceries is paid from checking only
            .insert_transaction(post(&mut checking, &f.groceries, -7000));
        changes.put_account(checking).put_account(savings);
        f.storage.commit(changes).unwrap();

        let service = BudgetService::new(&f.storage, &f.locks);
        let balances = service.savings_balances(f.owner).unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].category.id, vacation.id);
        assert_eq!(balances[0].funded, Money::from_minor(70000));
        assert_eq!(balances[0].spent, Money::from_minor(25000));
        assert_eq!(balances[0].available, Money::from_minor(45000));

        let groceries = service.savings_balance(f.owner, f.groceries.id).unwrap();
        assert_eq!(groceries.funded, Money::from_minor(7000));
        assert_eq!(groceries.spent, Money::ZERO);

        assert!(service.savings_balances(OwnerId::new()).unwrap().is_empty());
    }

    #[test]
    fn test_overview_totals() {
        let f = fixture();
        let service = BudgetService::new(&f.storage, &f.locks);
        service
            .set_allocation(f.owner, f.period.id, f.groceries.id, Money::from_minor(150000))
            .unwrap();

        let overview = service.overview(f.owner, f.period.id).unwrap();
        assert_eq!(overview.lines.len(), 1);
        assert_eq!(overview.total_allocated, Money::from_minor(150000));
        assert_eq!(overview.total_remaining, Money::from_minor(150000));
        assert_eq!(overview.overspent().count(), 0);
    }
}
