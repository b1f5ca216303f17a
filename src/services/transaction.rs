//! Transaction processor
//!
//! Income and expense postings, reversals, and transaction queries. Every
//! posting resolves its period and adjusts the account balance inside one
//! commit, while holding the owner's shared period gate and the account lock.

use chrono::NaiveDate;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    AccountId, CategoryId, Money, OwnerId, PeriodId, Transaction, TransactionId, TransactionKind,
};
use crate::storage::{Changeset, Storage};

use super::account::AccountService;
use super::category::CategoryService;
use super::locks::LockManager;
use super::period::PeriodService;
use super::transfer::TransferService;

/// Input for a new income or expense
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub category_id: Option<CategoryId>,
    /// Signed amount; positive for income, negative for expenses
    pub amount: Money,
    pub kind: TransactionKind,
    pub occurred_at: NaiveDate,
    pub memo: String,
}

impl NewTransaction {
    pub fn new(
        account_id: AccountId,
        category_id: Option<CategoryId>,
        amount: Money,
        kind: TransactionKind,
        occurred_at: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            category_id,
            amount,
            kind,
            occurred_at,
            memo: String::new(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }
}

/// Filter options for listing transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub account_id: Option<AccountId>,
    pub category_id: Option<CategoryId>,
    pub period_id: Option<PeriodId>,
    pub kind: Option<TransactionKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn period(mut self, period_id: PeriodId) -> Self {
        self.period_id = Some(period_id);
        self
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        self.account_id.map_or(true, |id| txn.account_id == id)
            && self.category_id.map_or(true, |id| txn.category_id == Some(id))
            && self.period_id.map_or(true, |id| txn.period_id == id)
            && self.kind.map_or(true, |kind| txn.kind == kind)
            && self.from.map_or(true, |from| txn.occurred_at >= from)
            && self.to.map_or(true, |to| txn.occurred_at <= to)
    }
}

/// Service for income and expense postings
pub struct TransactionService<'a> {
    storage: &'a Storage,
    locks: &'a LockManager,
}

impl<'a> TransactionService<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockManager) -> Self {
        Self { storage, locks }
    }

    /// Record an income or expense against an account
    pub fn record_simple(&self, owner_id: OwnerId, input: NewTransaction) -> LedgerResult<Transaction> {
        if input.kind.is_transfer() {
            return Err(LedgerError::Validation(
                "transfer legs are recorded through transfers".into(),
            ));
        }
        if input.amount.is_zero() {
            return Err(LedgerError::Validation("amount must be non-zero".into()));
        }
        if input.amount.checked_neg().is_none() {
            return Err(LedgerError::Validation(format!(
                "amount {} is out of range",
                input.amount
            )));
        }
        if !input.kind.sign_matches(input.amount) {
            return Err(LedgerError::Validation(format!(
                "{} amount has the wrong sign: {}",
                input.kind, input.amount
            )));
        }

        let account = AccountService::new(self.storage, self.locks).owned(owner_id, input.account_id)?;
        if account.closed {
            return Err(LedgerError::Validation(format!(
                "account '{}' is closed",
                account.name
            )));
        }
        let categories = CategoryService::new(self.storage, self.locks);
        if let Some(category_id) = input.category_id {
            categories.active(owner_id, category_id)?;
        }

        let txn = self.locks.shared(owner_id, || {
            self.locks.with_accounts(&[input.account_id], || {
                // Archiving takes the exclusive gate, so this check holds
                // until the commit
                if let Some(category_id) = input.category_id {
                    categories.active(owner_id, category_id)?;
                }
                let period = PeriodService::new(self.storage, self.locks)
                    .resolve_open(owner_id, input.occurred_at)?;

                let txn = Transaction::simple(
                    owner_id,
                    input.account_id,
                    input.category_id,
                    period.id,
                    input.amount,
                    input.kind,
                    input.occurred_at,
                )
                .with_memo(input.memo.clone());
                txn.validate()
                    .map_err(|e| LedgerError::Validation(e.to_string()))?;

                let mut changes = Changeset::new();
                AccountService::new(self.storage, self.locks).post(&mut changes, txn.account_id, txn.amount)?;
                changes.insert_transaction(txn.clone());
                self.storage.commit(changes)?;
                Ok(txn)
            })
        })?;

        info!(
            transaction = %txn.id,
            account = %txn.account_id,
            kind = %txn.kind,
            amount = %txn.amount,
            "transaction recorded"
        );
        Ok(txn)
    }

    pub fn get(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        self.storage.transactions.get(id)
    }

    /// Fetch a transaction, rejecting ids that belong to someone else
    pub fn owned(&self, owner_id: OwnerId, id: TransactionId) -> LedgerResult<Transaction> {
        let txn = self
            .storage
            .transactions
            .get(id)?
            .ok_or_else(|| LedgerError::transaction_not_found(id.to_string()))?;
        if txn.owner_id != owner_id {
            return Err(LedgerError::Validation(format!(
                "transaction {} belongs to another owner",
                id
            )));
        }
        Ok(txn)
    }

    /// Find a transaction by full UUID or short display id
    pub fn find(&self, owner_id: OwnerId, identifier: &str) -> LedgerResult<Option<Transaction>> {
        Ok(self
            .storage
            .transactions
            .for_owner(owner_id)?
            .into_iter()
            .find(|t| t.id.to_string() == identifier || t.id.as_uuid().to_string() == identifier))
    }

    /// Offset a committed transaction with a new one dated `occurred_at`
    ///
    /// An income or expense is answered with the opposite kind for the same
    /// magnitude and category. A transfer (either leg may be named) is
    /// answered with a transfer in the opposite direction. Returns the new
    /// transactions.
    pub fn reverse(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
        occurred_at: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        let original = self.owned(owner_id, transaction_id)?;
        if original.is_reversal() {
            return Err(LedgerError::Validation(format!(
                "transaction {} is itself a reversal",
                original.id
            )));
        }

        let created = if original.is_transfer() {
            self.reverse_transfer(owner_id, &original, occurred_at)?
        } else {
            self.reverse_simple(owner_id, &original, occurred_at)?
        };

        info!(
            original = %original.id,
            reversals = created.len(),
            "transaction reversed"
        );
        Ok(created)
    }

    fn ensure_not_reversed(&self, txn: &Transaction) -> LedgerResult<()> {
        if let Some(reversal) = self.storage.transactions.reversal_of(txn.id)? {
            return Err(LedgerError::Validation(format!(
                "transaction {} was already reversed by {}",
                txn.id, reversal
            )));
        }
        Ok(())
    }

    fn reverse_simple(
        &self,
        owner_id: OwnerId,
        original: &Transaction,
        occurred_at: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        self.ensure_not_reversed(original)?;

        self.locks.shared(owner_id, || {
            self.locks.with_accounts(&[original.account_id], || {
                // A concurrent reversal may have won the lock first
                self.ensure_not_reversed(original)?;
                let period = PeriodService::new(self.storage, self.locks)
                    .resolve_open(owner_id, occurred_at)?;

                let reversal = Transaction::simple(
                    owner_id,
                    original.account_id,
                    original.category_id,
                    period.id,
                    -original.amount,
                    original.kind.opposite(),
                    occurred_at,
                )
                .with_memo(format!("Reversal of {}", original.id))
                .reversing(original.id);

                let mut changes = Changeset::new();
                AccountService::new(self.storage, self.locks).post(
                    &mut changes,
                    reversal.account_id,
                    reversal.amount,
                )?;
                changes.insert_transaction(reversal.clone());
                self.storage.commit(changes)?;
                Ok(vec![reversal])
            })
        })
    }

    fn reverse_transfer(
        &self,
        owner_id: OwnerId,
        leg: &Transaction,
        occurred_at: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        let transfer_id = leg.transfer_id.ok_or_else(|| {
            LedgerError::InvariantViolation(format!("transfer leg {} has no transfer id", leg.id))
        })?;
        let transfer = TransferService::new(self.storage, self.locks).get_transfer(owner_id, transfer_id)?;
        let (orig_out, orig_in) = (transfer.outflow, transfer.inflow);
        self.ensure_not_reversed(&orig_out)?;
        self.ensure_not_reversed(&orig_in)?;

        self.locks.shared(owner_id, || {
            self.locks
                .with_accounts(&[orig_out.account_id, orig_in.account_id], || {
                    self.ensure_not_reversed(&orig_out)?;
                    self.ensure_not_reversed(&orig_in)?;
                    let period = PeriodService::new(self.storage, self.locks)
                        .resolve_open(owner_id, occurred_at)?;

                    // Money flows back: the old destination pays the old source
                    let (new_out, new_in) = Transaction::transfer_pair(
                        owner_id,
                        orig_in.account_id,
                        orig_out.account_id,
                        period.id,
                        orig_in.amount,
                        occurred_at,
                    );
                    let memo = format!("Reversal of {}", transfer_id);
                    let new_out = new_out.with_memo(memo.clone()).reversing(orig_in.id);
                    let new_in = new_in.with_memo(memo).reversing(orig_out.id);

                    let mut changes = Changeset::new();
                    TransferService::new(self.storage, self.locks)
                        .stage_transfer(&mut changes, &new_out, &new_in)?;
                    self.storage.commit(changes)?;
                    Ok(vec![new_out, new_in])
                })
        })
    }

    /// Transactions of the owner matching `filter`, newest first
    pub fn list(&self, owner_id: OwnerId, filter: &TransactionFilter) -> LedgerResult<Vec<Transaction>> {
        let candidates = match (filter.account_id, filter.period_id) {
            (Some(account_id), _) => self.storage.transactions.for_account(account_id)?,
            (None, Some(period_id)) => self.storage.transactions.for_period(period_id)?,
            (None, None) => self.storage.transactions.for_owner(owner_id)?,
        };

        let matching = candidates
            .into_iter()
            .filter(|t| t.owner_id == owner_id && filter.matches(t));
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }
}
