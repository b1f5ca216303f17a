//! Period repository
//!
//! Periods are indexed per owner by month, so resolving a date to its period
//! is an ordered-map lookup rather than a scan.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{BudgetPeriod, Month, OwnerId, PeriodId};

use super::{read_lock, write_lock};

#[derive(Default)]
struct PeriodTable {
    data: HashMap<PeriodId, BudgetPeriod>,
    by_owner: HashMap<OwnerId, BTreeMap<Month, PeriodId>>,
}

impl PeriodTable {
    fn insert(&mut self, period: BudgetPeriod) {
        self.by_owner
            .entry(period.owner_id)
            .or_default()
            .insert(period.month, period.id);
        self.data.insert(period.id, period);
    }
}

/// In-memory period table
pub struct PeriodRepository {
    table: RwLock<PeriodTable>,
}

impl PeriodRepository {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(PeriodTable::default()),
        }
    }

    pub(crate) fn load(&self, periods: Vec<BudgetPeriod>) -> LedgerResult<()> {
        let mut table = write_lock(&self.table)?;
        *table = PeriodTable::default();
        for period in periods {
            table.insert(period);
        }
        Ok(())
    }

    pub(crate) fn rows(&self) -> LedgerResult<Vec<BudgetPeriod>> {
        let table = read_lock(&self.table)?;
        let mut periods: Vec<_> = table.data.values().cloned().collect();
        periods.sort_by(|a, b| a.owner_id.cmp(&b.owner_id).then(a.month.cmp(&b.month)));
        Ok(periods)
    }

    /// Reject staged periods that would break the per-owner sequence
    ///
    /// A month may hold only one period, and after the commit each owner may
    /// have at most one open period.
    pub(crate) fn check(&self, staged: &[BudgetPeriod]) -> LedgerResult<()> {
        let table = read_lock(&self.table)?;

        for period in staged {
            if let Some(existing) = table
                .by_owner
                .get(&period.owner_id)
                .and_then(|months| months.get(&period.month))
            {
                if *existing != period.id {
                    return Err(LedgerError::InvariantViolation(format!(
                        "a period for {} already exists",
                        period.month
                    )));
                }
            }
        }

        let mut open_after: HashMap<OwnerId, usize> = HashMap::new();
        for period in staged {
            if period.is_open() {
                *open_after.entry(period.owner_id).or_default() += 1;
            }
        }
        for (owner_id, staged_open) in open_after.iter_mut() {
            let untouched_open = table
                .by_owner
                .get(owner_id)
                .into_iter()
                .flat_map(|months| months.values())
                .filter(|id| !staged.iter().any(|p| p.id == **id))
                .filter_map(|id| table.data.get(id))
                .filter(|p| p.is_open())
                .count();
            if *staged_open + untouched_open > 1 {
                return Err(LedgerError::InvariantViolation(
                    "an owner may have only one open period".into(),
                ));
            }
        }

        Ok(())
    }

    pub(crate) fn apply(&self, periods: &[BudgetPeriod]) -> LedgerResult<()> {
        let mut table = write_lock(&self.table)?;
        for period in periods {
            table.insert(period.clone());
        }
        Ok(())
    }

    pub fn get(&self, id: PeriodId) -> LedgerResult<Option<BudgetPeriod>> {
        let table = read_lock(&self.table)?;
        Ok(table.data.get(&id).cloned())
    }

    /// All periods of one owner, oldest first
    pub fn for_owner(&self, owner_id: OwnerId) -> LedgerResult<Vec<BudgetPeriod>> {
        let table = read_lock(&self.table)?;
        Ok(table
            .by_owner
            .get(&owner_id)
            .into_iter()
            .flat_map(|months| months.values())
            .filter_map(|id| table.data.get(id).cloned())
            .collect())
    }

    /// The owner's open period, if they have any periods at all
    pub fn open_for(&self, owner_id: OwnerId) -> LedgerResult<Option<BudgetPeriod>> {
        let table = read_lock(&self.table)?;
        Ok(table
            .by_owner
            .get(&owner_id)
            .into_iter()
            .flat_map(|months| months.values().rev())
            .filter_map(|id| table.data.get(id))
            .find(|p| p.is_open())
            .cloned())
    }

    /// The owner's period whose range contains `date`
    pub fn containing(&self, owner_id: OwnerId, date: NaiveDate) -> LedgerResult<Option<BudgetPeriod>> {
        let table = read_lock(&self.table)?;
        Ok(table
            .by_owner
            .get(&owner_id)
            .and_then(|months| months.get(&Month::containing(date)))
            .and_then(|id| table.data.get(id))
            .cloned())
    }
}

impl Default for PeriodRepository {
    fn default() -> Self {
        Self::new()
    }
}
