//! Storage layer for the ledger
//!
//! All state lives in in-memory repositories backed by one JSON snapshot
//! (`data/ledger.json`). Writes go exclusively through [`Storage::commit`]:
//! the post-commit snapshot is written atomically first, and only then are
//! the repositories updated, so a failed write leaves both disk and memory
//! exactly as they were.

pub mod accounts;
pub mod budget;
pub mod categories;
pub mod changeset;
pub mod file_io;
pub mod periods;
pub mod rollovers;
pub mod transactions;

pub use accounts::AccountRepository;
pub use budget::BudgetRepository;
pub use categories::CategoryRepository;
pub use changeset::Changeset;
pub use file_io::{read_json, write_json_atomic};
pub use periods::PeriodRepository;
pub use rollovers::RolloverRepository;
pub use transactions::TransactionRepository;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audit::{AuditEntry, AuditLogger, EntityType};
use crate::config::paths::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, AccountId, BudgetItem, BudgetPeriod, Category, Money, OwnerId, PeriodId,
    RolloverRecord, Transaction,
};

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> LedgerResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|e| {
        LedgerError::StorageUnavailable(format!("Failed to acquire read lock: {}", e))
    })
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> LedgerResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|e| {
        LedgerError::StorageUnavailable(format!("Failed to acquire write lock: {}", e))
    })
}

const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SNAPSHOT_SCHEMA_VERSION
}

/// The durable form of the whole ledger
///
/// Activity counters and indexes are not stored; they are rebuilt from the
/// transactions on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub periods: Vec<BudgetPeriod>,
    #[serde(default)]
    pub budget_items: Vec<BudgetItem>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub rollovers: Vec<RolloverRecord>,
}

fn upsert_row<T, K: PartialEq>(rows: &mut Vec<T>, row: &T, key: impl Fn(&T) -> K)
where
    T: Clone,
{
    let k = key(row);
    match rows.iter_mut().find(|r| key(r) == k) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

impl LedgerSnapshot {
    /// Fold a changeset into the snapshot
    fn merge(&mut self, changes: &Changeset) {
        for account in &changes.accounts {
            upsert_row(&mut self.accounts, account, |a| a.id);
        }
        for category in &changes.categories {
            upsert_row(&mut self.categories, category, |c| c.id);
        }
        for period in &changes.periods {
            upsert_row(&mut self.periods, period, |p| p.id);
        }
        for item in &changes.budget_items {
            upsert_row(&mut self.budget_items, item, |i| (i.period_id, i.category_id));
        }
        self.transactions.extend(changes.transactions.iter().cloned());
        self.rollovers.extend(changes.rollovers.iter().cloned());
    }
}

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    ledger_file: Option<PathBuf>,
    audit: Option<AuditLogger>,
    verify_balances: bool,
    commit_lock: Mutex<()>,
    pub accounts: AccountRepository,
    pub categories: CategoryRepository,
    pub periods: PeriodRepository,
    pub budget: BudgetRepository,
    pub transactions: TransactionRepository,
    pub rollovers: RolloverRepository,
}

impl Storage {
    /// Open the on-disk ledger, loading the snapshot if one exists
    pub fn open(paths: &LedgerPaths) -> LedgerResult<Self> {
        paths.ensure_directories()?;

        let ledger_file = paths.ledger_file();
        let snapshot: LedgerSnapshot = read_json(&ledger_file)?;
        if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(LedgerError::StorageUnavailable(format!(
                "{} has schema version {}, newer than supported {}",
                ledger_file.display(),
                snapshot.schema_version,
                SNAPSHOT_SCHEMA_VERSION
            )));
        }

        let storage = Self {
            ledger_file: Some(ledger_file),
            audit: Some(AuditLogger::new(paths.audit_log())),
            ..Self::in_memory()
        };
        storage.load(snapshot)?;
        debug!(
            accounts = storage.accounts.count()?,
            transactions = storage.transactions.count()?,
            "ledger loaded"
        );
        Ok(storage)
    }

    /// A ledger that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            ledger_file: None,
            audit: None,
            verify_balances: true,
            commit_lock: Mutex::new(()),
            accounts: AccountRepository::new(),
            categories: CategoryRepository::new(),
            periods: PeriodRepository::new(),
            budget: BudgetRepository::new(),
            transactions: TransactionRepository::new(),
            rollovers: RolloverRepository::new(),
        }
    }

    pub fn without_audit(mut self) -> Self {
        self.audit = None;
        self
    }

    /// Toggle the cached-balance check performed inside every commit
    pub fn with_balance_verification(mut self, enabled: bool) -> Self {
        self.verify_balances = enabled;
        self
    }

    pub fn audit_log(&self) -> Option<&AuditLogger> {
        self.audit.as_ref()
    }

    fn load(&self, snapshot: LedgerSnapshot) -> LedgerResult<()> {
        self.accounts.load(snapshot.accounts)?;
        self.categories.load(snapshot.categories)?;
        self.periods.load(snapshot.periods)?;
        self.budget.load(snapshot.budget_items)?;
        self.transactions.load(snapshot.transactions)?;
        self.rollovers.load(snapshot.rollovers)?;
        Ok(())
    }

    /// The current state as a snapshot
    pub fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        self.consistent(|s| s.snapshot_unlocked())
    }

    fn snapshot_unlocked(&self) -> LedgerResult<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            accounts: self.accounts.rows()?,
            categories: self.categories.rows()?,
            periods: self.periods.rows()?,
            budget_items: self.budget.rows()?,
            transactions: self.transactions.rows()?,
            rollovers: self.rollovers.rows()?,
        })
    }

    /// Run a read with no commit in flight
    ///
    /// `f` must not call [`Storage::commit`].
    pub fn consistent<T>(&self, f: impl FnOnce(&Self) -> LedgerResult<T>) -> LedgerResult<T> {
        let _guard = self.commit_lock.lock();
        f(self)
    }

    /// Atomically apply a changeset
    ///
    /// Checks run first, then the snapshot is written, then memory is
    /// updated. Any error before the memory update leaves no trace.
    pub fn commit(&self, changes: Changeset) -> LedgerResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let _guard = self.commit_lock.lock();

        self.transactions.check(&changes.transactions)?;
        self.rollovers.check(&changes.rollovers)?;
        self.budget.check(&changes.budget_items)?;
        self.periods.check(&changes.periods)?;
        if self.verify_balances {
            self.check_balances(&changes)?;
        }

        if let Some(path) = &self.ledger_file {
            let mut snapshot = self.snapshot_unlocked()?;
            snapshot.merge(&changes);
            write_json_atomic(path, &snapshot)?;
        }

        let audit_entries = match &self.audit {
            Some(_) => self.audit_entries(&changes)?,
            None => Vec::new(),
        };

        // History before the caches derived from it
        self.transactions.apply(&changes.transactions)?;
        self.rollovers.apply(&changes.rollovers)?;
        self.accounts.apply(&changes.accounts)?;
        self.categories.apply(&changes.categories)?;
        self.periods.apply(&changes.periods)?;
        self.budget.apply(&changes.budget_items)?;

        debug!(rows = changes.row_count(), "commit applied");

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_batch(&audit_entries) {
                warn!(error = %e, "failed to write audit entries");
            }
        }

        Ok(())
    }

    /// Every account touched by the changeset must end with a cached balance
    /// equal to the sum of its history including the staged transactions
    fn check_balances(&self, changes: &Changeset) -> LedgerResult<()> {
        let touched: BTreeSet<AccountId> = changes
            .accounts
            .iter()
            .map(|a| a.id)
            .chain(changes.transactions.iter().map(|t| t.account_id))
            .collect();

        for account_id in touched {
            let cached = match changes.account(account_id) {
                Some(staged) => staged.balance,
                None => self
                    .accounts
                    .get(account_id)?
                    .map(|a| a.balance)
                    .ok_or_else(|| LedgerError::account_not_found(account_id.to_string()))?,
            };
            let staged = changes
                .transactions
                .iter()
                .filter(|t| t.account_id == account_id)
                .map(|t| t.amount);
            let history = Money::checked_sum(
                std::iter::once(self.transactions.sum_for_account(account_id)?).chain(staged),
            )
            .ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "history of account {} overflows",
                    account_id
                ))
            })?;
            if cached != history {
                return Err(LedgerError::InvariantViolation(format!(
                    "account {} balance {} does not match history {}",
                    account_id, cached, history
                )));
            }
        }
        Ok(())
    }

    fn audit_entries(&self, changes: &Changeset) -> LedgerResult<Vec<AuditEntry>> {
        let mut entries = Vec::with_capacity(changes.row_count());

        for account in &changes.accounts {
            let before = self.accounts.get(account.id)?;
            entries.push(AuditEntry::for_change(
                EntityType::Account,
                account.id.to_string(),
                Some(account.name.clone()),
                before.as_ref(),
                account,
            )
            .owned_by(Some(account.owner_id)));
        }
        for category in &changes.categories {
            let before = self.categories.get(category.id)?;
            entries.push(AuditEntry::for_change(
                EntityType::Category,
                category.id.to_string(),
                Some(category.name.clone()),
                before.as_ref(),
                category,
            )
            .owned_by(Some(category.owner_id)));
        }
        for period in &changes.periods {
            let before = self.periods.get(period.id)?;
            entries.push(AuditEntry::for_change(
                EntityType::Period,
                period.id.to_string(),
                Some(period.month.to_string()),
                before.as_ref(),
                period,
            )
            .owned_by(Some(period.owner_id)));
        }
        for item in &changes.budget_items {
            let before = self.budget.get(item.period_id, item.category_id)?;
            entries.push(AuditEntry::for_change(
                EntityType::BudgetItem,
                item.id.to_string(),
                None,
                before.as_ref(),
                item,
            )
            .owned_by(self.period_owner(changes, item.period_id)?));
        }
        for txn in &changes.transactions {
            let name = (!txn.memo.is_empty()).then(|| txn.memo.clone());
            entries.push(AuditEntry::create(
                EntityType::Transaction,
                txn.id.to_string(),
                name,
                txn,
            )
            .owned_by(Some(txn.owner_id)));
        }
        for record in &changes.rollovers {
            entries.push(AuditEntry::create(
                EntityType::Rollover,
                format!("{}/{}", record.from_period_id, record.category_id),
                Some(record.policy.to_string()),
                record,
            )
            .owned_by(self.period_owner(changes, record.from_period_id)?));
        }

        Ok(entries)
    }

    /// Budget items and rollovers belong to whoever owns their period
    fn period_owner(&self, changes: &Changeset, period_id: PeriodId) -> LedgerResult<Option<OwnerId>> {
        if let Some(period) = changes.periods.iter().find(|p| p.id == period_id) {
            return Ok(Some(period.owner_id));
        }
        Ok(self.periods.get(period_id)?.map(|p| p.owner_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, OwnerId, PeriodId, TransactionKind};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn funded_account(owner: OwnerId, minor: i64) -> (Account, Transaction) {
        let mut account = Account::new(owner, "Checking", AccountKind::Checking);
        let txn = Transaction::simple(
            owner,
            account.id,
            None,
            PeriodId::new(),
            Money::from_minor(minor),
            TransactionKind::Income,
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        );
        account.apply(txn.amount).unwrap();
        (account, txn)
    }

    #[test]
    fn test_commit_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let owner = OwnerId::new();
        let (account, txn) = funded_account(owner, 380000);

        {
            let storage = Storage::open(&paths).unwrap();
            let mut changes = Changeset::new();
            changes.put_account(account.clone()).insert_transaction(txn.clone());
            storage.commit(changes).unwrap();
        }

        let reopened = Storage::open(&paths).unwrap();
        assert_eq!(reopened.accounts.get(account.id).unwrap(), Some(account.clone()));
        assert_eq!(reopened.transactions.get(txn.id).unwrap(), Some(txn));
        assert_eq!(
            reopened.transactions.sum_for_account(account.id).unwrap(),
            Money::from_minor(380000)
        );

        let audit = reopened.audit_log().unwrap().read_all().unwrap();
        assert_eq!(audit.len(), 2);
    }

    #[test]
    fn test_balance_mismatch_is_rejected_before_anything_changes() {
        let storage = Storage::in_memory();
        let owner = OwnerId::new();
        let (mut account, txn) = funded_account(owner, 1000);
        account.balance = Money::from_minor(999);

        let mut changes = Changeset::new();
        changes.put_account(account.clone()).insert_transaction(txn);
        assert!(matches!(
            storage.commit(changes),
            Err(LedgerError::InvariantViolation(_))
        ));
        assert!(storage.accounts.get(account.id).unwrap().is_none());
        assert_eq!(storage.transactions.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_write_leaves_memory_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(&paths).unwrap();

        // Occupy the temp-file path so the snapshot write fails
        std::fs::create_dir_all(paths.ledger_file().with_extension("json.tmp").join("x"))
            .unwrap();

        let (account, txn) = funded_account(OwnerId::new(), 500);
        let mut changes = Changeset::new();
        changes.put_account(account.clone()).insert_transaction(txn);

        assert!(matches!(
            storage.commit(changes),
            Err(LedgerError::StorageUnavailable(_))
        ));
        assert!(storage.accounts.get(account.id).unwrap().is_none());
        assert_eq!(storage.transactions.count().unwrap(), 0);
    }

    #[test]
    fn test_counter_overflow_is_rejected_before_anything_changes() {
        let storage = Storage::in_memory();
        let owner = OwnerId::new();
        let category = crate::models::CategoryId::new();
        let period = PeriodId::new();

        let mut rich = Account::new(owner, "Rich", AccountKind::Checking);
        let windfall = Transaction::simple(
            owner,
            rich.id,
            Some(category),
            period,
            Money::from_minor(i64::MAX),
            TransactionKind::Income,
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        );
        rich.apply(windfall.amount).unwrap();
        let mut changes = Changeset::new();
        changes.put_account(rich).insert_transaction(windfall);
        storage.commit(changes).unwrap();

        let mut other = Account::new(owner, "Other", AccountKind::Checking);
        let cent = Transaction::simple(
            owner,
            other.id,
            Some(category),
            period,
            Money::from_minor(1),
            TransactionKind::Income,
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
        );
        other.apply(cent.amount).unwrap();
        let mut changes = Changeset::new();
        changes.put_account(other.clone()).insert_transaction(cent);

        assert!(storage.commit(changes).unwrap_err().is_validation());
        assert!(storage.accounts.get(other.id).unwrap().is_none());
        assert_eq!(storage.transactions.count().unwrap(), 1);
        assert_eq!(
            storage.transactions.activity(period, category).unwrap().income,
            Money::from_minor(i64::MAX)
        );
    }

    #[test]
    fn test_snapshot_does_not_store_counters() {
        let storage = Storage::in_memory();
        let (account, txn) = funded_account(OwnerId::new(), 100);
        let mut changes = Changeset::new();
        changes.put_account(account).insert_transaction(txn);
        storage.commit(changes).unwrap();

        let json = serde_json::to_value(storage.snapshot().unwrap()).unwrap();
        assert!(json.get("activity").is_none());
        assert_eq!(json["transactions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        write_json_atomic(
            paths.ledger_file(),
            &serde_json::json!({"schema_version": SNAPSHOT_SCHEMA_VERSION + 1}),
        )
        .unwrap();
        assert!(Storage::open(&paths).is_err());
    }
}
