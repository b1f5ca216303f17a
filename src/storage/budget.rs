//! Budget item repository
//!
//! Items are keyed by (period, category); the key is the uniqueness rule.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{BudgetItem, CategoryId, PeriodId};

use super::{read_lock, write_lock};

/// In-memory budget item table
pub struct BudgetRepository {
    items: RwLock<HashMap<(PeriodId, CategoryId), BudgetItem>>,
}

impl BudgetRepository {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn load(&self, items: Vec<BudgetItem>) -> LedgerResult<()> {
        let mut data = write_lock(&self.items)?;
        data.clear();
        for item in items {
            let key = (item.period_id, item.category_id);
            if data.insert(key, item).is_some() {
                return Err(LedgerError::InvariantViolation(format!(
                    "duplicate budget item for period {} category {}",
                    key.0, key.1
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn rows(&self) -> LedgerResult<Vec<BudgetItem>> {
        let data = read_lock(&self.items)?;
        let mut items: Vec<_> = data.values().cloned().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    /// A staged item must keep the id of the row it replaces
    pub(crate) fn check(&self, staged: &[BudgetItem]) -> LedgerResult<()> {
        let data = read_lock(&self.items)?;
        for item in staged {
            if let Some(existing) = data.get(&(item.period_id, item.category_id)) {
                if existing.id != item.id {
                    return Err(LedgerError::InvariantViolation(format!(
                        "budget item for period {} category {} already exists",
                        item.period_id, item.category_id
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn apply(&self, items: &[BudgetItem]) -> LedgerResult<()> {
        let mut data = write_lock(&self.items)?;
        for item in items {
            data.insert((item.period_id, item.category_id), item.clone());
        }
        Ok(())
    }

    pub fn get(&self, period_id: PeriodId, category_id: CategoryId) -> LedgerResult<Option<BudgetItem>> {
        let data = read_lock(&self.items)?;
        Ok(data.get(&(period_id, category_id)).cloned())
    }

    pub fn for_period(&self, period_id: PeriodId) -> LedgerResult<Vec<BudgetItem>> {
        let data = read_lock(&self.items)?;
        Ok(data
            .values()
            .filter(|i| i.period_id == period_id)
            .cloned()
            .collect())
    }
}

impl Default for BudgetRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;

    #[test]
    fn test_upsert_by_key() {
        let repo = BudgetRepository::new();
        let mut item = BudgetItem::new(PeriodId::new(), CategoryId::new());
        repo.apply(&[item.clone()]).unwrap();

        item.set_allocated(Money::from_minor(150000));
        repo.check(&[item.clone()]).unwrap();
        repo.apply(&[item.clone()]).unwrap();

        let stored = repo.get(item.period_id, item.category_id).unwrap().unwrap();
        assert_eq!(stored.allocated, Money::from_minor(150000));
        assert_eq!(repo.for_period(item.period_id).unwrap().len(), 1);
    }

    #[test]
    fn test_second_item_for_same_key_is_rejected() {
        let repo = BudgetRepository::new();
        let item = BudgetItem::new(PeriodId::new(), CategoryId::new());
        repo.apply(&[item.clone()]).unwrap();

        let rival = BudgetItem::new(item.period_id, item.category_id);
        assert!(matches!(
            repo.check(&[rival]),
            Err(LedgerError::InvariantViolation(_))
        ));
    }
}
