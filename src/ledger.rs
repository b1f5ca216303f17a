//! The ledger facade
//!
//! [`Ledger`] owns the storage, the lock table, the settings and a clock, and
//! exposes every operation callers need. It is `Sync`; share it between
//! request threads behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::audit::AuditEntry;
use crate::config::{LedgerPaths, Settings};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, AccountId, AccountKind, BudgetItem, BudgetPeriod, Category, CategoryId,
    CategorySummary, Money, Month, OwnerId, PeriodId, RolloverPolicy, Transaction,
    TransactionId, TransactionKind, TransferId, TransferResult,
};
use crate::services::{
    AccountService, BudgetOverview, BudgetService, CategoryService, LockManager, NewTransaction,
    NewTransfer, PeriodClose, PeriodService, SavingsBalance, TransactionFilter,
    TransactionService, TransferService,
};
use crate::storage::Storage;

/// Source of "today" for period resolution and closing
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The local calendar date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.lock() = today;
    }

    pub fn advance_days(&self, days: u64) {
        let mut today = self.today.lock();
        if let Some(next) = today.checked_add_days(Days::new(days)) {
            *today = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock()
    }
}

/// Problems found by [`Ledger::verify`]
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub accounts_checked: usize,
    pub periods_checked: usize,
    pub transactions_checked: usize,
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Entry point to the budget ledger
pub struct Ledger {
    storage: Storage,
    locks: LockManager,
    settings: Settings,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    /// Open the on-disk ledger under `paths`
    pub fn open(paths: &LedgerPaths, settings: Settings) -> LedgerResult<Self> {
        let mut storage =
            Storage::open(paths)?.with_balance_verification(settings.verify_balances_on_commit);
        if !settings.audit_enabled {
            storage = storage.without_audit();
        }
        Ok(Self::with_storage(storage, settings))
    }

    /// A ledger that lives only in memory
    pub fn in_memory(settings: Settings) -> Self {
        let storage = Storage::in_memory().with_balance_verification(settings.verify_balances_on_commit);
        Self::with_storage(storage, settings)
    }

    fn with_storage(storage: Storage, settings: Settings) -> Self {
        Self {
            storage,
            locks: LockManager::new(settings.locking),
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn accounts(&self) -> AccountService<'_> {
        AccountService::new(&self.storage, &self.locks)
    }

    fn categories(&self) -> CategoryService<'_> {
        CategoryService::new(&self.storage, &self.locks)
    }

    fn periods(&self) -> PeriodService<'_> {
        PeriodService::new(&self.storage, &self.locks)
    }

    fn budget(&self) -> BudgetService<'_> {
        BudgetService::new(&self.storage, &self.locks)
    }

    fn transactions(&self) -> TransactionService<'_> {
        TransactionService::new(&self.storage, &self.locks)
    }

    fn transfers(&self) -> TransferService<'_> {
        TransferService::new(&self.storage, &self.locks)
    }

    // Accounts

    pub fn open_account(
        &self,
        owner_id: OwnerId,
        name: &str,
        kind: AccountKind,
        allow_negative: bool,
    ) -> LedgerResult<Account> {
        self.accounts().open(owner_id, name, kind, allow_negative)
    }

    pub fn close_account(&self, owner_id: OwnerId, account_id: AccountId) -> LedgerResult<Account> {
        self.accounts().close(owner_id, account_id)
    }

    pub fn list_accounts(&self, owner_id: OwnerId, include_closed: bool) -> LedgerResult<Vec<Account>> {
        self.accounts().list(owner_id, include_closed)
    }

    /// Look an account up by name or id
    pub fn find_account(&self, owner_id: OwnerId, identifier: &str) -> LedgerResult<Account> {
        self.accounts()
            .find(owner_id, identifier)?
            .ok_or_else(|| LedgerError::account_not_found(identifier))
    }

    pub fn get_account_balance(&self, owner_id: OwnerId, account_id: AccountId) -> LedgerResult<Money> {
        self.accounts().balance(owner_id, account_id)
    }

    /// Balance rebuilt from transactions committed at or before `as_of`
    pub fn balance_as_of(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
        as_of: DateTime<Utc>,
    ) -> LedgerResult<Money> {
        self.accounts().balance_as_of(owner_id, account_id, as_of)
    }

    // Categories

    /// Create a category; `policy` defaults to the configured rollover policy
    pub fn create_category(
        &self,
        owner_id: OwnerId,
        name: &str,
        policy: Option<RolloverPolicy>,
    ) -> LedgerResult<Category> {
        let policy = policy.unwrap_or(self.settings.default_rollover_policy);
        self.categories().create(owner_id, name, policy)
    }

    /// Every category, archived ones included
    pub fn list_categories(&self, owner_id: OwnerId) -> LedgerResult<Vec<Category>> {
        self.categories().list(owner_id)
    }

    pub fn rename_category(&self, owner_id: OwnerId, category_id: CategoryId, name: &str) -> LedgerResult<Category> {
        self.categories().rename(owner_id, category_id, name)
    }

    /// Stop new postings and allocations to a category; its history,
    /// summaries and rollovers remain
    pub fn archive_category(&self, owner_id: OwnerId, category_id: CategoryId) -> LedgerResult<Category> {
        self.categories().archive(owner_id, category_id)
    }

    pub fn find_category(&self, owner_id: OwnerId, identifier: &str) -> LedgerResult<Category> {
        self.categories()
            .find(owner_id, identifier)?
            .ok_or_else(|| LedgerError::category_not_found(identifier))
    }

    // Periods

    /// The owner's open period, created on first use
    pub fn current_period(&self, owner_id: OwnerId) -> LedgerResult<BudgetPeriod> {
        self.periods().current_period(owner_id, self.today())
    }

    pub fn list_periods(&self, owner_id: OwnerId) -> LedgerResult<Vec<BudgetPeriod>> {
        self.periods().list(owner_id)
    }

    pub fn period_for_date(&self, owner_id: OwnerId, date: NaiveDate) -> LedgerResult<Option<BudgetPeriod>> {
        self.periods().period_for_date(owner_id, date)
    }

    /// The owner's period for `month`
    pub fn period_for_month(&self, owner_id: OwnerId, month: Month) -> LedgerResult<BudgetPeriod> {
        self.periods()
            .find_month(owner_id, month)?
            .ok_or_else(|| LedgerError::period_not_found(month.to_string()))
    }

    /// Close the open period and roll it over; returns the closed period's id
    pub fn close_current_period(&self, owner_id: OwnerId) -> LedgerResult<PeriodId> {
        Ok(self.close_current(owner_id)?.closed.id)
    }

    /// Like [`close_current_period`](Self::close_current_period), with the
    /// successor and rollover records
    pub fn close_current(&self, owner_id: OwnerId) -> LedgerResult<PeriodClose> {
        self.periods().close_current(owner_id, self.today())
    }

    pub fn close_period(&self, owner_id: OwnerId, period_id: PeriodId) -> LedgerResult<PeriodClose> {
        self.periods().close_period(owner_id, period_id, self.today())
    }

    /// Close every elapsed period, oldest first
    pub fn close_elapsed_periods(&self, owner_id: OwnerId) -> LedgerResult<Vec<PeriodClose>> {
        let closed = self.periods().close_elapsed(owner_id, self.today())?;
        if !closed.is_empty() {
            info!(owner = %owner_id, closed = closed.len(), "caught up elapsed periods");
        }
        Ok(closed)
    }

    // Budget

    pub fn set_allocation(
        &self,
        owner_id: OwnerId,
        period_id: PeriodId,
        category_id: CategoryId,
        allocated: Money,
    ) -> LedgerResult<BudgetItem> {
        self.budget().set_allocation(owner_id, period_id, category_id, allocated)
    }

    /// Per-category summaries for one period
    pub fn get_budget_summary(&self, owner_id: OwnerId, period_id: PeriodId) -> LedgerResult<Vec<CategorySummary>> {
        self.budget().summaries(owner_id, period_id)
    }

    pub fn category_summary(
        &self,
        owner_id: OwnerId,
        period_id: PeriodId,
        category_id: CategoryId,
    ) -> LedgerResult<CategorySummary> {
        self.budget().summary(owner_id, period_id, category_id)
    }

    /// [`category_summary`](Self::category_summary) rebuilt from raw
    /// transactions instead of the live counters
    pub fn recompute_summary(
        &self,
        owner_id: OwnerId,
        period_id: PeriodId,
        category_id: CategoryId,
    ) -> LedgerResult<CategorySummary> {
        self.budget().recompute_summary(owner_id, period_id, category_id)
    }

    pub fn budget_overview(&self, owner_id: OwnerId, period_id: PeriodId) -> LedgerResult<BudgetOverview> {
        self.budget().overview(owner_id, period_id)
    }

    pub fn savings_balances(&self, owner_id: OwnerId) -> LedgerResult<Vec<SavingsBalance>> {
        self.budget().savings_balances(owner_id)
    }

    pub fn savings_balance(&self, owner_id: OwnerId, category_id: CategoryId) -> LedgerResult<SavingsBalance> {
        self.budget().savings_balance(owner_id, category_id)
    }

    // Transactions

    /// Record an income (positive `amount`) or expense (negative `amount`)
    pub fn post_transaction(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
        category_id: Option<CategoryId>,
        amount: Money,
        kind: TransactionKind,
        occurred_at: NaiveDate,
    ) -> LedgerResult<TransactionId> {
        let input = NewTransaction::new(account_id, category_id, amount, kind, occurred_at);
        Ok(self.post(owner_id, input)?.id)
    }

    pub fn post(&self, owner_id: OwnerId, input: NewTransaction) -> LedgerResult<Transaction> {
        self.current_period(owner_id)?;
        self.transactions().record_simple(owner_id, input)
    }

    pub fn post_transfer(
        &self,
        owner_id: OwnerId,
        from: AccountId,
        to: AccountId,
        amount: Money,
        occurred_at: NaiveDate,
    ) -> LedgerResult<TransferId> {
        let input = NewTransfer::new(from, to, amount, occurred_at);
        Ok(self.transfer(owner_id, input)?.transfer_id)
    }

    pub fn transfer(&self, owner_id: OwnerId, input: NewTransfer) -> LedgerResult<TransferResult> {
        self.current_period(owner_id)?;
        self.transfers().record_transfer(owner_id, input)
    }

    pub fn reverse_transaction(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
        occurred_at: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        self.transactions().reverse(owner_id, transaction_id, occurred_at)
    }

    pub fn list_transactions(&self, owner_id: OwnerId, filter: &TransactionFilter) -> LedgerResult<Vec<Transaction>> {
        self.transactions().list(owner_id, filter)
    }

    pub fn find_transaction(&self, owner_id: OwnerId, identifier: &str) -> LedgerResult<Transaction> {
        self.transactions()
            .find(owner_id, identifier)?
            .ok_or_else(|| LedgerError::transaction_not_found(identifier))
    }

    /// The owner's latest `limit` audit entries; empty when auditing is off
    pub fn audit_history(&self, owner_id: OwnerId, limit: usize) -> LedgerResult<Vec<AuditEntry>> {
        match self.storage.audit_log() {
            Some(log) => log.read_recent(owner_id, limit),
            None => Ok(Vec::new()),
        }
    }

    // Verification

    /// Check the owner's ledger against its history
    ///
    /// Cached balances must equal their transaction history, periods must
    /// form a gapless month sequence with one open period, transfers must
    /// have two balanced legs, incremental summaries must match a recompute,
    /// and every closed period must carry its rollover marker.
    pub fn verify(&self, owner_id: OwnerId) -> LedgerResult<VerifyReport> {
        let report = self.storage.consistent(|storage| {
            let mut report = VerifyReport::default();

            for account in storage.accounts.for_owner(owner_id)? {
                report.accounts_checked += 1;
                let history = storage.transactions.sum_for_account(account.id)?;
                if account.balance != history {
                    report.problems.push(format!(
                        "account '{}' caches {} but its history sums to {}",
                        account.name, account.balance, history
                    ));
                }
            }

            let periods = storage.periods.for_owner(owner_id)?;
            report.periods_checked = periods.len();
            let open = periods.iter().filter(|p| p.is_open()).count();
            if !periods.is_empty() && open != 1 {
                report.problems.push(format!("{} open periods", open));
            }
            for pair in periods.windows(2) {
                if pair[1].month != pair[0].month.next() {
                    report.problems.push(format!(
                        "gap between periods {} and {}",
                        pair[0].month, pair[1].month
                    ));
                }
            }
            for period in periods.iter().filter(|p| !p.is_open() && !p.rollover_applied) {
                report
                    .problems
                    .push(format!("closed period {} has no rollover marker", period.month));
            }

            let transactions = storage.transactions.for_owner(owner_id)?;
            report.transactions_checked = transactions.len();
            let mut transfers: BTreeMap<TransferId, Vec<&Transaction>> = BTreeMap::new();
            for txn in &transactions {
                if let Some(transfer_id) = txn.transfer_id {
                    transfers.entry(transfer_id).or_default().push(txn);
                }
                match periods.iter().find(|p| p.id == txn.period_id) {
                    Some(period) if period.contains(txn.occurred_at) => {}
                    _ => report.problems.push(format!(
                        "transaction {} dated {} is tagged to the wrong period",
                        txn.id, txn.occurred_at
                    )),
                }
            }
            for (transfer_id, legs) in &transfers {
                let net: Money = legs.iter().map(|t| t.amount).sum();
                let kinds_ok = legs.len() == 2
                    && legs.iter().any(|t| t.kind == TransactionKind::TransferOut)
                    && legs.iter().any(|t| t.kind == TransactionKind::TransferIn);
                if !kinds_ok || !net.is_zero() {
                    report
                        .problems
                        .push(format!("transfer {} does not have two balanced legs", transfer_id));
                }
            }

            let tracker = BudgetService::new(storage, &self.locks);
            let categories = storage.categories.for_owner(owner_id)?;
            for period in &periods {
                for category in &categories {
                    let live = tracker.summary_unchecked(period.id, category.id)?;
                    let rebuilt = tracker.recompute_summary(owner_id, period.id, category.id)?;
                    if live != rebuilt {
                        report.problems.push(format!(
                            "summary for '{}' in {} drifted from its transactions",
                            category.name, period.month
                        ));
                    }
                }
            }

            Ok(report)
        })?;

        for problem in &report.problems {
            warn!(owner = %owner_id, "{}", problem);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ledger_on(today: NaiveDate) -> (Ledger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(today));
        let ledger = Ledger::in_memory(Settings::default()).with_clock(clock.clone());
        (ledger, clock)
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(date(2025, 1, 31));
        clock.advance_days(1);
        assert_eq!(clock.today(), date(2025, 2, 1));
        clock.set(date(2024, 6, 1));
        assert_eq!(clock.today(), date(2024, 6, 1));
    }

    #[test]
    fn test_posting_creates_first_period() {
        let (ledger, _) = ledger_on(date(2025, 1, 10));
        let owner = OwnerId::new();
        let account = ledger.open_account(owner, "Checking", AccountKind::Checking, false).unwrap();

        ledger
            .post_transaction(owner, account.id, None, Money::from_minor(5000), TransactionKind::Income, date(2025, 1, 10))
            .unwrap();
        assert_eq!(ledger.list_periods(owner).unwrap().len(), 1);
        assert_eq!(ledger.get_account_balance(owner, account.id).unwrap(), Money::from_minor(5000));
    }

    #[test]
    fn test_default_policy_comes_from_settings() {
        let settings = Settings {
            default_rollover_policy: RolloverPolicy::NoCarry,
            ..Settings::default()
        };
        let ledger = Ledger::in_memory(settings);
        let owner = OwnerId::new();

        let plain = ledger.create_category(owner, "Fun", None).unwrap();
        let explicit = ledger
            .create_category(owner, "Rent", Some(RolloverPolicy::CarryBoth))
            .unwrap();
        assert_eq!(plain.rollover_policy, RolloverPolicy::NoCarry);
        assert_eq!(explicit.rollover_policy, RolloverPolicy::CarryBoth);
    }

    #[test]
    fn test_find_helpers_report_not_found() {
        let ledger = Ledger::in_memory(Settings::default());
        let owner = OwnerId::new();
        assert!(ledger.find_account(owner, "nope").unwrap_err().is_not_found());
        assert!(ledger.find_category(owner, "nope").unwrap_err().is_not_found());
        assert!(ledger.find_transaction(owner, "nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_verify_clean_ledger() {
        let (ledger, clock) = ledger_on(date(2025, 1, 5));
        let owner = OwnerId::new();
        let checking = ledger.open_account(owner, "Checking", AccountKind::Checking, false).unwrap();
        let savings = ledger.open_account(owner, "Savings", AccountKind::Savings, false).unwrap();
        let food = ledger.create_category(owner, "Food", None).unwrap();

        ledger
            .post_transaction(owner, checking.id, None, Money::from_minor(10000), TransactionKind::Income, date(2025, 1, 5))
            .unwrap();
        ledger
            .post_transaction(owner, checking.id, Some(food.id), Money::from_minor(-2500), TransactionKind::Expense, date(2025, 1, 6))
            .unwrap();
        ledger
            .post_transfer(owner, checking.id, savings.id, Money::from_minor(1000), date(2025, 1, 7))
            .unwrap();
        clock.set(date(2025, 2, 1));
        ledger.close_current_period(owner).unwrap();

        let report = ledger.verify(owner).unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);
        assert_eq!(report.accounts_checked, 2);
        assert_eq!(report.periods_checked, 2);
        assert_eq!(report.transactions_checked, 4);
    }

    #[test]
    fn test_verify_flags_closed_period_without_marker() {
        let ledger = Ledger::in_memory(Settings::default());
        let owner = OwnerId::new();
        let mut jan = BudgetPeriod::open(owner, Month::new(2025, 1).unwrap());
        let feb = jan.successor();
        jan.close();

        let mut changes = crate::storage::Changeset::new();
        changes.put_period(jan).put_period(feb);
        ledger.storage().commit(changes).unwrap();

        let report = ledger.verify(owner).unwrap();
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].contains("2025-01"));
    }

    #[test]
    fn test_verify_flags_owner_without_open_period() {
        let ledger = Ledger::in_memory(Settings::default());
        let owner = OwnerId::new();
        let mut jan = BudgetPeriod::open(owner, Month::new(2025, 1).unwrap());
        jan.close();
        jan.rollover_applied = true;

        let mut changes = crate::storage::Changeset::new();
        changes.put_period(jan);
        ledger.storage().commit(changes).unwrap();

        let report = ledger.verify(owner).unwrap();
        assert_eq!(report.problems, vec!["0 open periods".to_string()]);

        // No periods at all is a fresh owner, not a problem
        assert!(ledger.verify(OwnerId::new()).unwrap().is_ok());
    }

    #[test]
    fn test_extreme_amounts_are_rejected_cleanly() {
        let (ledger, _) = ledger_on(date(2025, 3, 1));
        let owner = OwnerId::new();
        let a = ledger.open_account(owner, "A", AccountKind::Checking, false).unwrap();
        let b = ledger.open_account(owner, "B", AccountKind::Checking, false).unwrap();
        let card = ledger.open_account(owner, "Card", AccountKind::Checking, true).unwrap();
        let bonus = ledger.create_category(owner, "Bonus", None).unwrap();

        ledger
            .post_transaction(owner, a.id, Some(bonus.id), Money::from_minor(i64::MAX), TransactionKind::Income, date(2025, 3, 1))
            .unwrap();

        // Fits B's balance but not the category's income counter
        let err = ledger
            .post_transaction(owner, b.id, Some(bonus.id), Money::from_minor(1), TransactionKind::Income, date(2025, 3, 1))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(ledger.get_account_balance(owner, b.id).unwrap(), Money::ZERO);

        let err = ledger
            .post_transaction(owner, card.id, None, Money::from_minor(i64::MIN), TransactionKind::Expense, date(2025, 3, 1))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(ledger.get_account_balance(owner, card.id).unwrap(), Money::ZERO);

        // The ledger is still usable and consistent
        ledger
            .post_transaction(owner, b.id, None, Money::from_minor(500), TransactionKind::Income, date(2025, 3, 2))
            .unwrap();
        let report = ledger.verify(owner).unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);
    }
}
