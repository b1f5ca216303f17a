//! Rollover record repository
//!
//! One record per (closing period, category). The record is what makes a
//! rollover apply exactly once, so inserting a second record for a pair is
//! rejected here regardless of what the caller checked.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{CategoryId, PeriodId, RolloverRecord};

use super::{read_lock, write_lock};

/// In-memory rollover table keyed by (from period, category)
pub struct RolloverRepository {
    data: RwLock<HashMap<(PeriodId, CategoryId), RolloverRecord>>,
}

impl RolloverRepository {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn load(&self, records: Vec<RolloverRecord>) -> LedgerResult<()> {
        let mut data = write_lock(&self.data)?;
        data.clear();
        data.extend(
            records
                .into_iter()
                .map(|r| ((r.from_period_id, r.category_id), r)),
        );
        Ok(())
    }

    pub(crate) fn rows(&self) -> LedgerResult<Vec<RolloverRecord>> {
        let data = read_lock(&self.data)?;
        let mut records: Vec<_> = data.values().cloned().collect();
        records.sort_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then(a.from_period_id.cmp(&b.from_period_id))
                .then(a.category_id.cmp(&b.category_id))
        });
        Ok(records)
    }

    pub(crate) fn check(&self, staged: &[RolloverRecord]) -> LedgerResult<()> {
        let data = read_lock(&self.data)?;
        for (i, record) in staged.iter().enumerate() {
            let key = (record.from_period_id, record.category_id);
            let staged_twice = staged[..i]
                .iter()
                .any(|r| (r.from_period_id, r.category_id) == key);
            if data.contains_key(&key) || staged_twice {
                return Err(LedgerError::InvariantViolation(format!(
                    "rollover from period {} for category {} already applied",
                    record.from_period_id, record.category_id
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn apply(&self, records: &[RolloverRecord]) -> LedgerResult<()> {
        let mut data = write_lock(&self.data)?;
        for record in records {
            data.insert((record.from_period_id, record.category_id), record.clone());
        }
        Ok(())
    }

    pub fn get(&self, from_period_id: PeriodId, category_id: CategoryId) -> LedgerResult<Option<RolloverRecord>> {
        let data = read_lock(&self.data)?;
        Ok(data.get(&(from_period_id, category_id)).cloned())
    }

    /// Records written when `from_period_id` closed
    pub fn from_period(&self, from_period_id: PeriodId) -> LedgerResult<Vec<RolloverRecord>> {
        let data = read_lock(&self.data)?;
        Ok(data
            .values()
            .filter(|r| r.from_period_id == from_period_id)
            .cloned()
            .collect())
    }
}

impl Default for RolloverRepository {
    fn default() -> Self {
        Self::new()
    }
}
