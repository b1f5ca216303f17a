//! Transaction repository with indexes and activity counters
//!
//! Transactions are insert-only. Alongside the rows the repository keeps
//! per-account and per-period indexes, the reversal links, and the
//! per-(period, category) income/expense counters that budget summaries are
//! served from. All of it sits behind one lock so a commit's rows and their
//! counter updates become visible together.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    AccountId, CategoryActivity, CategoryId, Money, OwnerId, PeriodId, Transaction,
    TransactionId, TransferId,
};

use super::{read_lock, write_lock};

#[derive(Default)]
struct TransactionTable {
    data: HashMap<TransactionId, Transaction>,
    by_account: HashMap<AccountId, Vec<TransactionId>>,
    by_period: HashMap<PeriodId, Vec<TransactionId>>,
    by_transfer: HashMap<TransferId, Vec<TransactionId>>,
    /// original -> reversal
    reversed_by: HashMap<TransactionId, TransactionId>,
    activity: HashMap<(PeriodId, CategoryId), CategoryActivity>,
}

impl TransactionTable {
    fn insert(&mut self, txn: Transaction) {
        let id = txn.id;
        self.by_account.entry(txn.account_id).or_default().push(id);
        self.by_period.entry(txn.period_id).or_default().push(id);
        if let Some(transfer_id) = txn.transfer_id {
            self.by_transfer.entry(transfer_id).or_default().push(id);
        }
        if let Some(original) = txn.reverses {
            self.reversed_by.insert(original, id);
        }
        if let Some(key) = activity_key(&txn) {
            self.activity.entry(key).or_default().record(txn.amount);
        }
        self.data.insert(id, txn);
    }

    fn activity(&self, key: &(PeriodId, CategoryId)) -> CategoryActivity {
        self.activity.get(key).copied().unwrap_or_default()
    }

    fn collect(&self, ids: Option<&Vec<TransactionId>>) -> Vec<Transaction> {
        let mut transactions: Vec<_> = ids
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.data.get(id).cloned())
            .collect();
        sort_newest_first(&mut transactions);
        transactions
    }
}

/// The counter a transaction feeds; transfers and uncategorized postings
/// feed none
fn activity_key(txn: &Transaction) -> Option<(PeriodId, CategoryId)> {
    match txn.category_id {
        Some(category_id) if !txn.is_transfer() => Some((txn.period_id, category_id)),
        _ => None,
    }
}

fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then(b.created_at.cmp(&a.created_at))
            .then(b.id.cmp(&a.id))
    });
}

/// In-memory transaction table
pub struct TransactionRepository {
    table: RwLock<TransactionTable>,
}

impl TransactionRepository {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(TransactionTable::default()),
        }
    }

    /// Replace contents and rebuild every index and counter
    pub(crate) fn load(&self, transactions: Vec<Transaction>) -> LedgerResult<()> {
        let mut table = write_lock(&self.table)?;
        *table = TransactionTable::default();
        for txn in transactions {
            if table.data.contains_key(&txn.id) {
                return Err(LedgerError::InvariantViolation(format!(
                    "duplicate transaction {} in snapshot",
                    txn.id
                )));
            }
            table.insert(txn);
        }
        Ok(())
    }

    pub(crate) fn rows(&self) -> LedgerResult<Vec<Transaction>> {
        let table = read_lock(&self.table)?;
        let mut transactions: Vec<_> = table.data.values().cloned().collect();
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(transactions)
    }

    /// Staged transactions must all be new, and their amounts must fit the
    /// category counters they feed
    pub(crate) fn check(&self, staged: &[Transaction]) -> LedgerResult<()> {
        let table = read_lock(&self.table)?;
        let mut counters: HashMap<(PeriodId, CategoryId), CategoryActivity> = HashMap::new();

        for (i, txn) in staged.iter().enumerate() {
            if table.data.contains_key(&txn.id) || staged[..i].iter().any(|t| t.id == txn.id) {
                return Err(LedgerError::InvariantViolation(format!(
                    "transaction {} is already committed",
                    txn.id
                )));
            }
            if txn.amount.checked_neg().is_none() {
                return Err(LedgerError::Validation(format!(
                    "amount {} is out of range",
                    txn.amount
                )));
            }
            if let Some(key) = activity_key(txn) {
                let current = counters
                    .get(&key)
                    .copied()
                    .unwrap_or_else(|| table.activity(&key));
                let next = current.checked_record(txn.amount).ok_or_else(|| {
                    LedgerError::Validation(format!(
                        "amount {} overflows the category totals for the period",
                        txn.amount
                    ))
                })?;
                counters.insert(key, next);
            }
        }
        Ok(())
    }

    pub(crate) fn apply(&self, transactions: &[Transaction]) -> LedgerResult<()> {
        let mut table = write_lock(&self.table)?;
        for txn in transactions {
            table.insert(txn.clone());
        }
        Ok(())
    }

    pub fn get(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        let table = read_lock(&self.table)?;
        Ok(table.data.get(&id).cloned())
    }

    /// Transactions on one account, newest first
    pub fn for_account(&self, account_id: AccountId) -> LedgerResult<Vec<Transaction>> {
        let table = read_lock(&self.table)?;
        Ok(table.collect(table.by_account.get(&account_id)))
    }

    /// Transactions tagged to one period, newest first
    pub fn for_period(&self, period_id: PeriodId) -> LedgerResult<Vec<Transaction>> {
        let table = read_lock(&self.table)?;
        Ok(table.collect(table.by_period.get(&period_id)))
    }

    /// Every transaction of one owner, newest first
    pub fn for_owner(&self, owner_id: OwnerId) -> LedgerResult<Vec<Transaction>> {
        let table = read_lock(&self.table)?;
        let mut transactions: Vec<_> = table
            .data
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        sort_newest_first(&mut transactions);
        Ok(transactions)
    }

    /// Both legs of a transfer
    pub fn transfer_legs(&self, transfer_id: TransferId) -> LedgerResult<Vec<Transaction>> {
        let table = read_lock(&self.table)?;
        Ok(table.collect(table.by_transfer.get(&transfer_id)))
    }

    /// The transaction that reversed `id`, if any
    pub fn reversal_of(&self, id: TransactionId) -> LedgerResult<Option<TransactionId>> {
        let table = read_lock(&self.table)?;
        Ok(table.reversed_by.get(&id).copied())
    }

    /// Incrementally maintained counters for one category in one period
    pub fn activity(&self, period_id: PeriodId, category_id: CategoryId) -> LedgerResult<CategoryActivity> {
        let table = read_lock(&self.table)?;
        Ok(table.activity(&(period_id, category_id)))
    }

    /// Sum of every committed amount on an account
    pub fn sum_for_account(&self, account_id: AccountId) -> LedgerResult<Money> {
        self.sum_for_account_until(account_id, None)
    }

    /// Sum of amounts on an account committed at or before `as_of`
    pub fn sum_for_account_until(
        &self,
        account_id: AccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<Money> {
        let table = read_lock(&self.table)?;
        let amounts = table
            .by_account
            .get(&account_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| table.data.get(id))
            .filter(|t| as_of.map_or(true, |ts| t.created_at <= ts))
            .map(|t| t.amount);
        Money::checked_sum(amounts).ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "history of account {} overflows",
                account_id
            ))
        })
    }

    pub fn count(&self) -> LedgerResult<usize> {
        Ok(read_lock(&self.table)?.data.len())
    }
}

impl Default for TransactionRepository {
    fn default() -> Self {
        Self::new()
    }
}
