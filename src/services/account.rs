//! Account service
//!
//! Owns the account store contract: opening and soft-closing accounts,
//! staging balance deltas for a commit, and reconstructing balances from
//! history.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, AccountId, AccountKind, Money, OwnerId, PostingRejection};
use crate::storage::{Changeset, Storage};

use super::locks::LockManager;

/// Service for account management
pub struct AccountService<'a> {
    storage: &'a Storage,
    locks: &'a LockManager,
}

impl<'a> AccountService<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockManager) -> Self {
        Self { storage, locks }
    }

    /// Open a new account with a zero balance
    pub fn open(
        &self,
        owner_id: OwnerId,
        name: &str,
        kind: AccountKind,
        allow_negative: bool,
    ) -> LedgerResult<Account> {
        let name = name.trim();
        let account = Account::new(owner_id, name, kind).allowing_negative(allow_negative);
        account
            .validate()
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        // Exclusive so two sessions cannot both claim the same name
        self.locks.exclusive(owner_id, || {
            if self.storage.accounts.get_by_name(owner_id, name)?.is_some() {
                return Err(LedgerError::Duplicate {
                    entity_type: "Account",
                    identifier: name.to_string(),
                });
            }

            let mut changes = Changeset::new();
            changes.put_account(account.clone());
            self.storage.commit(changes)
        })?;

        info!(account = %account.id, owner = %owner_id, kind = %kind, "account opened");
        Ok(account)
    }

    /// Soft-close an account; its history and balance remain
    pub fn close(&self, owner_id: OwnerId, account_id: AccountId) -> LedgerResult<Account> {
        self.owned(owner_id, account_id)?;

        let account = self.locks.with_accounts(&[account_id], || {
            let mut account = self.owned(owner_id, account_id)?;
            if account.closed {
                return Err(LedgerError::Validation(format!(
                    "account '{}' is already closed",
                    account.name
                )));
            }
            account.close();

            let mut changes = Changeset::new();
            changes.put_account(account.clone());
            self.storage.commit(changes)?;
            Ok(account)
        })?;

        info!(account = %account_id, "account closed");
        Ok(account)
    }

    pub fn get(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        self.storage.accounts.get(id)
    }

    /// Fetch an account, rejecting ids that belong to someone else
    pub fn owned(&self, owner_id: OwnerId, id: AccountId) -> LedgerResult<Account> {
        let account = self
            .storage
            .accounts
            .get(id)?
            .ok_or_else(|| LedgerError::account_not_found(id.to_string()))?;
        if account.owner_id != owner_id {
            return Err(LedgerError::Validation(format!(
                "account {} belongs to another owner",
                id
            )));
        }
        Ok(account)
    }

    /// Find an account by name or ID string
    pub fn find(&self, owner_id: OwnerId, identifier: &str) -> LedgerResult<Option<Account>> {
        if let Some(account) = self.storage.accounts.get_by_name(owner_id, identifier)? {
            return Ok(Some(account));
        }

        // Full UUID or the short "acc-xxxxxxxx" display form
        Ok(self.list(owner_id, true)?.into_iter().find(|a| {
            a.id.to_string() == identifier || a.id.as_uuid().to_string() == identifier
        }))
    }

    pub fn list(&self, owner_id: OwnerId, include_closed: bool) -> LedgerResult<Vec<Account>> {
        let accounts = self.storage.accounts.for_owner(owner_id)?;
        Ok(accounts
            .into_iter()
            .filter(|a| include_closed || !a.closed)
            .collect())
    }

    /// Stage `delta` against an account in `changes`
    ///
    /// The caller must hold the account's lock. Builds on any copy already
    /// staged in the changeset, so several deltas to one account compose.
    pub fn post(
        &self,
        changes: &mut Changeset,
        account_id: AccountId,
        delta: Money,
    ) -> LedgerResult<Account> {
        let mut account = match changes.account(account_id) {
            Some(staged) => staged.clone(),
            None => self
                .storage
                .accounts
                .get(account_id)?
                .ok_or_else(|| LedgerError::account_not_found(account_id.to_string()))?,
        };

        if account.closed {
            return Err(LedgerError::Validation(format!(
                "account '{}' is closed",
                account.name
            )));
        }

        account.apply(delta).map_err(|rejection| match rejection {
            PostingRejection::WouldGoNegative { needed, available } => {
                LedgerError::InsufficientFunds {
                    account: account.name.clone(),
                    needed: needed.minor(),
                    available: available.minor(),
                }
            }
            PostingRejection::Overflow => {
                LedgerError::Validation(format!("amount {} overflows the balance", delta))
            }
        })?;

        changes.put_account(account.clone());
        Ok(account)
    }

    /// Current cached balance
    pub fn balance(&self, owner_id: OwnerId, account_id: AccountId) -> LedgerResult<Money> {
        Ok(self.owned(owner_id, account_id)?.balance)
    }

    /// Balance reconstructed from transactions committed at or before `as_of`
    pub fn balance_as_of(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
        as_of: DateTime<Utc>,
    ) -> LedgerResult<Money> {
        self.owned(owner_id, account_id)?;
        self.storage
            .transactions
            .sum_for_account_until(account_id, Some(as_of))
    }

    /// Compare the cached balance with the full history
    pub fn verify_balance(&self, account_id: AccountId) -> LedgerResult<Money> {
        self.storage.consistent(|storage| {
            let account = storage
                .accounts
                .get(account_id)?
                .ok_or_else(|| LedgerError::account_not_found(account_id.to_string()))?;
            let history = storage.transactions.sum_for_account(account_id)?;
            if account.balance != history {
                return Err(LedgerError::InvariantViolation(format!(
                    "account '{}' caches {} but its history sums to {}",
                    account.name, account.balance, history
                )));
            }
            Ok(history)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockSettings;

    fn setup() -> (Storage, LockManager) {
        (Storage::in_memory(), LockManager::new(LockSettings::default()))
    }

    #[test]
    fn test_open_account() {
        let (storage, locks) = setup();
        let service = AccountService::new(&storage, &locks);
        let owner = OwnerId::new();

        let account = service
            .open(owner, "  Checking ", AccountKind::Checking, false)
            .unwrap();
        assert_eq!(account.name, "Checking");
        assert_eq!(account.balance, Money::ZERO);
        assert_eq!(service.list(owner, false).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected_per_owner() {
        let (storage, locks) = setup();
        let service = AccountService::new(&storage, &locks);
        let owner = OwnerId::new();

        service.open(owner, "Checking", AccountKind::Checking, false).unwrap();
        let err = service
            .open(owner, "checking", AccountKind::Savings, false)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate { .. }));

        // Another owner may reuse the name
        service
            .open(OwnerId::new(), "Checking", AccountKind::Checking, false)
            .unwrap();
    }

    #[test]
    fn test_post_maps_rejection_to_insufficient_funds() {
        let (storage, locks) = setup();
        let service = AccountService::new(&storage, &locks);
        let account = service
            .open(OwnerId::new(), "Checking", AccountKind::Checking, false)
            .unwrap();

        let mut changes = Changeset::new();
        let err = service
            .post(&mut changes, account.id, Money::from_minor(-1))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                account: "Checking".into(),
                needed: 1,
                available: 0,
            }
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_post_composes_within_changeset() {
        let (storage, locks) = setup();
        let service = AccountService::new(&storage, &locks);
        let account = service
            .open(OwnerId::new(), "Checking", AccountKind::Checking, false)
            .unwrap();

        let mut changes = Changeset::new();
        service
            .post(&mut changes, account.id, Money::from_minor(500))
            .unwrap();
        let staged = service
            .post(&mut changes, account.id, Money::from_minor(-200))
            .unwrap();
        assert_eq!(staged.balance, Money::from_minor(300));

        // Nothing is visible until the changeset commits
        assert_eq!(
            storage.accounts.get(account.id).unwrap().unwrap().balance,
            Money::ZERO
        );
    }

    #[test]
    fn test_closed_account_rejects_postings() {
        let (storage, locks) = setup();
        let service = AccountService::new(&storage, &locks);
        let owner = OwnerId::new();
        let account = service
            .open(owner, "Old", AccountKind::Savings, true)
            .unwrap();
        service.close(owner, account.id).unwrap();

        let mut changes = Changeset::new();
        let err = service
            .post(&mut changes, account.id, Money::from_minor(100))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(service.list(owner, false).unwrap().is_empty());
        assert_eq!(service.list(owner, true).unwrap().len(), 1);
    }

    #[test]
    fn test_cross_owner_access_is_validation_error() {
        let (storage, locks) = setup();
        let service = AccountService::new(&storage, &locks);
        let account = service
            .open(OwnerId::new(), "Checking", AccountKind::Checking, false)
            .unwrap();

        let err = service.balance(OwnerId::new(), account.id).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(service
            .find(OwnerId::new(), &account.id.as_uuid().to_string())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_verify_balance_on_fresh_account() {
        let (storage, locks) = setup();
        let service = AccountService::new(&storage, &locks);
        let account = service
            .open(OwnerId::new(), "Checking", AccountKind::Checking, false)
            .unwrap();
        assert_eq!(service.verify_balance(account.id).unwrap(), Money::ZERO);
    }
}
