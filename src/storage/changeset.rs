//! The unit of atomic change
//!
//! Services stage every row an operation touches in a [`Changeset`] and hand
//! it to [`Storage::commit`](super::Storage::commit). Nothing is visible or
//! durable until the commit succeeds, so dropping a changeset abandons the
//! operation without side effects.

use crate::models::{
    Account, AccountId, BudgetItem, BudgetPeriod, Category, CategoryId, PeriodId,
    RolloverRecord, Transaction,
};

/// Rows to upsert (accounts, categories, periods, budget items) or insert
/// (transactions, rollover records) in one commit
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub(crate) accounts: Vec<Account>,
    pub(crate) categories: Vec<Category>,
    pub(crate) periods: Vec<BudgetPeriod>,
    pub(crate) budget_items: Vec<BudgetItem>,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) rollovers: Vec<RolloverRecord>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an account; replaces an earlier staged copy of the same account
    pub fn put_account(&mut self, account: Account) -> &mut Self {
        match self.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
        self
    }

    pub fn put_category(&mut self, category: Category) -> &mut Self {
        match self.categories.iter_mut().find(|c| c.id == category.id) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
        self
    }

    pub fn put_period(&mut self, period: BudgetPeriod) -> &mut Self {
        match self.periods.iter_mut().find(|p| p.id == period.id) {
            Some(existing) => *existing = period,
            None => self.periods.push(period),
        }
        self
    }

    /// Stage a budget item; keyed by (period, category)
    pub fn put_budget_item(&mut self, item: BudgetItem) -> &mut Self {
        match self
            .budget_items
            .iter_mut()
            .find(|i| i.period_id == item.period_id && i.category_id == item.category_id)
        {
            Some(existing) => *existing = item,
            None => self.budget_items.push(item),
        }
        self
    }

    pub fn insert_transaction(&mut self, txn: Transaction) -> &mut Self {
        self.transactions.push(txn);
        self
    }

    pub fn insert_rollover(&mut self, record: RolloverRecord) -> &mut Self {
        self.rollovers.push(record);
        self
    }

    /// The staged copy of an account, if any
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn budget_item(&self, period_id: PeriodId, category_id: CategoryId) -> Option<&BudgetItem> {
        self.budget_items
            .iter()
            .find(|i| i.period_id == period_id && i.category_id == category_id)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn row_count(&self) -> usize {
        self.accounts.len()
            + self.categories.len()
            + self.periods.len()
            + self.budget_items.len()
            + self.transactions.len()
            + self.rollovers.len()
    }
}
