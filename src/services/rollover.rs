//! Rollover calculator
//!
//! When a period closes, every category of the owner carries part of its
//! final `remaining` into the next period's `rolled_in`, according to the
//! category's policy. Each (closing period, category) pair gets exactly one
//! [`RolloverRecord`]; pairs that already have one are skipped, which is
//! what makes a retried or repaired close safe.

use chrono::Utc;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{BudgetItem, BudgetPeriod, RolloverRecord};
use crate::storage::{Changeset, Storage};

use super::budget::BudgetService;
use super::locks::LockManager;

pub struct RolloverCalculator<'a> {
    storage: &'a Storage,
    locks: &'a LockManager,
}

impl<'a> RolloverCalculator<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockManager) -> Self {
        Self { storage, locks }
    }

    /// Stage the rollover from `closing` into `next`
    ///
    /// Must run under the owner's exclusive gate so the closing period's
    /// figures are final. Returns the staged records.
    pub fn stage(
        &self,
        closing: &BudgetPeriod,
        next: &BudgetPeriod,
        changes: &mut Changeset,
    ) -> LedgerResult<Vec<RolloverRecord>> {
        let tracker = BudgetService::new(self.storage, self.locks);
        let mut records = Vec::new();

        for category in self.storage.categories.for_owner(closing.owner_id)? {
            if self.storage.rollovers.get(closing.id, category.id)?.is_some() {
                debug!(period = %closing.month, category = %category.name, "rollover already applied");
                continue;
            }

            let summary = tracker.summary_unchecked(closing.id, category.id)?;
            let carried = category.rollover_policy.carry(summary.remaining);

            let mut item = match changes.budget_item(next.id, category.id) {
                Some(staged) => staged.clone(),
                None => self
                    .storage
                    .budget
                    .get(next.id, category.id)?
                    .unwrap_or_else(|| BudgetItem::new(next.id, category.id)),
            };
            item.add_rolled_in(carried)
                .map_err(|e| LedgerError::InvariantViolation(format!("{}: {}", category.name, e)))?;
            changes.put_budget_item(item);

            let record = RolloverRecord {
                from_period_id: closing.id,
                to_period_id: next.id,
                category_id: category.id,
                policy: category.rollover_policy,
                remaining: summary.remaining,
                carried,
                applied_at: Utc::now(),
            };
            debug!(
                category = %category.name,
                policy = %record.policy,
                remaining = %record.remaining,
                carried = %record.carried,
                "rollover staged"
            );
            changes.insert_rollover(record.clone());
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockSettings;
    use crate::models::{
        Category, Money, Month, OwnerId, RolloverPolicy, Transaction, TransactionKind,
    };
    use crate::models::{Account, AccountKind};
    use chrono::NaiveDate;

    /// One closed January with the given categories, each allocated 1000 and
    /// spent 1300 (remaining -300), or spent 700 (remaining +300)
    fn january(policies: &[(RolloverPolicy, i64)]) -> (Storage, BudgetPeriod, BudgetPeriod, Vec<Category>) {
        let storage = Storage::in_memory();
        let owner = OwnerId::new();
        let mut jan = BudgetPeriod::open(owner, Month::new(2025, 1).unwrap());
        let feb = jan.successor();
        let mut account = Account::new(owner, "Checking", AccountKind::Checking).allowing_negative(true);

        let mut changes = Changeset::new();
        let mut categories = Vec::new();
        for (i, (policy, spent)) in policies.iter().enumerate() {
            let category = Category::new(owner, format!("Cat {}", i), *policy);
            let mut item = BudgetItem::new(jan.id, category.id);
            item.set_allocated(Money::from_minor(1000));
            let txn = Transaction::simple(
                owner,
                account.id,
                Some(category.id),
                jan.id,
                Money::from_minor(-spent),
                TransactionKind::Expense,
                NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            );
            account.apply(txn.amount).unwrap();
            changes
                .put_category(category.clone())
                .put_budget_item(item)
                .insert_transaction(txn);
            categories.push(category);
        }
        changes.put_account(account);
        jan.close();
        changes.put_period(jan.clone()).put_period(feb.clone());
        storage.commit(changes).unwrap();
        (storage, jan, feb, categories)
    }

    #[test]
    fn test_each_policy_carries_its_share() {
        let (storage, jan, feb, categories) = january(&[
            (RolloverPolicy::CarryUnspent, 700),
            (RolloverPolicy::CarryUnspent, 1300),
            (RolloverPolicy::CarryDeficit, 700),
            (RolloverPolicy::CarryDeficit, 1300),
            (RolloverPolicy::CarryBoth, 1300),
            (RolloverPolicy::NoCarry, 700),
        ]);
        let locks = LockManager::new(LockSettings::default());
        let calculator = RolloverCalculator::new(&storage, &locks);

        let mut changes = Changeset::new();
        let records = calculator.stage(&jan, &feb, &mut changes).unwrap();
        assert_eq!(records.len(), 6);

        let carried: Vec<i64> = categories
            .iter()
            .map(|c| changes.budget_item(feb.id, c.id).unwrap().rolled_in.minor())
            .collect();
        assert_eq!(carried, vec![300, 0, 0, -300, -300, 0]);

        // Allocation itself never carries
        for c in &categories {
            assert_eq!(changes.budget_item(feb.id, c.id).unwrap().allocated, Money::ZERO);
        }
    }

    #[test]
    fn test_recorded_pairs_are_skipped() {
        let (storage, jan, feb, _) = january(&[(RolloverPolicy::CarryUnspent, 700)]);
        let locks = LockManager::new(LockSettings::default());
        let calculator = RolloverCalculator::new(&storage, &locks);

        let mut changes = Changeset::new();
        calculator.stage(&jan, &feb, &mut changes).unwrap();
        storage.commit(changes).unwrap();

        let mut again = Changeset::new();
        let records = calculator.stage(&jan, &feb, &mut again).unwrap();
        assert!(records.is_empty());
        assert!(again.is_empty());
    }
}
