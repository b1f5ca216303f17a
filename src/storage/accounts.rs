//! Account repository

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::LedgerResult;
use crate::models::{Account, AccountId, OwnerId};

use super::{read_lock, write_lock};

/// In-memory account table
pub struct AccountRepository {
    data: RwLock<HashMap<AccountId, Account>>,
}

impl AccountRepository {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn load(&self, accounts: Vec<Account>) -> LedgerResult<()> {
        let mut data = write_lock(&self.data)?;
        data.clear();
        data.extend(accounts.into_iter().map(|a| (a.id, a)));
        Ok(())
    }

    pub(crate) fn rows(&self) -> LedgerResult<Vec<Account>> {
        let data = read_lock(&self.data)?;
        let mut accounts: Vec<_> = data.values().cloned().collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    pub(crate) fn apply(&self, accounts: &[Account]) -> LedgerResult<()> {
        let mut data = write_lock(&self.data)?;
        for account in accounts {
            data.insert(account.id, account.clone());
        }
        Ok(())
    }

    pub fn get(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        let data = read_lock(&self.data)?;
        Ok(data.get(&id).cloned())
    }

    /// All accounts of one owner, ordered by name
    pub fn for_owner(&self, owner_id: OwnerId) -> LedgerResult<Vec<Account>> {
        let data = read_lock(&self.data)?;
        let mut accounts: Vec<_> = data
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(accounts)
    }

    /// Case-insensitive name lookup within one owner
    pub fn get_by_name(&self, owner_id: OwnerId, name: &str) -> LedgerResult<Option<Account>> {
        let data = read_lock(&self.data)?;
        let name_lower = name.to_lowercase();
        Ok(data
            .values()
            .find(|a| a.owner_id == owner_id && a.name.to_lowercase() == name_lower)
            .cloned())
    }

    pub fn count(&self) -> LedgerResult<usize> {
        Ok(read_lock(&self.data)?.len())
    }
}

impl Default for AccountRepository {
    fn default() -> Self {
        Self::new()
    }
}
