//! Budget period manager
//!
//! Periods move `Open -> Closed` and never back. Closing a period, creating
//! its successor and carrying the rollover happen in a single commit under
//! the owner's exclusive period gate, so postings either land before the
//! close (and count toward the rollover) or see the closed period.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{BudgetPeriod, Month, OwnerId, PeriodId, RolloverRecord};
use crate::storage::{Changeset, Storage};

use super::locks::LockManager;
use super::rollover::RolloverCalculator;

/// Outcome of closing one period
#[derive(Debug, Clone)]
pub struct PeriodClose {
    pub closed: BudgetPeriod,
    pub next: BudgetPeriod,
    pub rollovers: Vec<RolloverRecord>,
}

/// Service for the period lifecycle
pub struct PeriodService<'a> {
    storage: &'a Storage,
    locks: &'a LockManager,
}

impl<'a> PeriodService<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockManager) -> Self {
        Self { storage, locks }
    }

    /// The owner's open period, creating the first one on demand
    ///
    /// The first period is anchored to the month of the owner's earliest
    /// account, or to `today` when they have none or it is earlier.
    pub fn current_period(&self, owner_id: OwnerId, today: NaiveDate) -> LedgerResult<BudgetPeriod> {
        if let Some(period) = self.storage.periods.open_for(owner_id)? {
            return Ok(period);
        }

        self.locks.exclusive(owner_id, || {
            // Another caller may have created it while we waited
            if let Some(period) = self.storage.periods.open_for(owner_id)? {
                return Ok(period);
            }

            let period = match self.storage.periods.for_owner(owner_id)?.last() {
                Some(latest) => latest.successor(),
                None => {
                    let anchor = self
                        .storage
                        .accounts
                        .for_owner(owner_id)?
                        .iter()
                        .map(|a| a.created_at.date_naive())
                        .chain(std::iter::once(today))
                        .min()
                        .unwrap_or(today);
                    BudgetPeriod::open(owner_id, Month::containing(anchor))
                }
            };

            let mut changes = Changeset::new();
            changes.put_period(period.clone());
            self.storage.commit(changes)?;

            info!(owner = %owner_id, period = %period.month, "period opened");
            Ok(period)
        })
    }

    pub fn get(&self, id: PeriodId) -> LedgerResult<Option<BudgetPeriod>> {
        self.storage.periods.get(id)
    }

    /// Fetch a period, rejecting ids that belong to someone else
    pub fn owned(&self, owner_id: OwnerId, id: PeriodId) -> LedgerResult<BudgetPeriod> {
        let period = self
            .storage
            .periods
            .get(id)?
            .ok_or_else(|| LedgerError::period_not_found(id.to_string()))?;
        if period.owner_id != owner_id {
            return Err(LedgerError::Validation(format!(
                "period {} belongs to another owner",
                id
            )));
        }
        Ok(period)
    }

    /// The owner's period for `month`, if one exists
    pub fn find_month(&self, owner_id: OwnerId, month: Month) -> LedgerResult<Option<BudgetPeriod>> {
        self.storage.periods.containing(owner_id, month.start_date())
    }

    /// The period whose range contains `date`, in any state
    pub fn period_for_date(&self, owner_id: OwnerId, date: NaiveDate) -> LedgerResult<Option<BudgetPeriod>> {
        self.storage.periods.containing(owner_id, date)
    }

    /// The open period a posting dated `date` belongs to
    ///
    /// Callers hold the owner's shared gate, so the answer cannot change
    /// before their commit.
    pub fn resolve_open(&self, owner_id: OwnerId, date: NaiveDate) -> LedgerResult<BudgetPeriod> {
        match self.storage.periods.containing(owner_id, date)? {
            Some(period) if period.is_open() => Ok(period),
            Some(period) => {
                debug!(%date, period = %period.month, "date falls in a closed period");
                Err(LedgerError::PeriodClosed {
                    period: period.month.to_string(),
                })
            }
            None => {
                debug!(%date, "no period covers date");
                Err(LedgerError::NoOpenPeriod { date })
            }
        }
    }

    /// All periods of the owner, oldest first
    pub fn list(&self, owner_id: OwnerId) -> LedgerResult<Vec<BudgetPeriod>> {
        self.storage.periods.for_owner(owner_id)
    }

    /// Close an elapsed period and roll its budget into the next one
    pub fn close_period(
        &self,
        owner_id: OwnerId,
        period_id: PeriodId,
        today: NaiveDate,
    ) -> LedgerResult<PeriodClose> {
        self.owned(owner_id, period_id)?;

        self.locks.exclusive(owner_id, || {
            let mut period = self.owned(owner_id, period_id)?;

            if !period.is_open() {
                if period.rollover_applied {
                    return Err(LedgerError::PeriodAlreadyClosed {
                        period: period.month.to_string(),
                    });
                }
                return self.repair(period);
            }

            if !period.has_elapsed(today) {
                return Err(LedgerError::PeriodNotElapsed {
                    period: period.month.to_string(),
                    end_date: period.end_date,
                });
            }

            let mut changes = Changeset::new();
            let next = self.next_period(&period, &mut changes)?;

            period.close();
            let rollovers =
                RolloverCalculator::new(self.storage, self.locks).stage(&period, &next, &mut changes)?;
            period.rollover_applied = true;
            changes.put_period(period.clone());
            self.storage.commit(changes)?;

            info!(
                owner = %owner_id,
                closed = %period.month,
                next = %next.month,
                categories = rollovers.len(),
                "period closed"
            );
            Ok(PeriodClose {
                closed: period,
                next,
                rollovers,
            })
        })
    }

    /// Close the owner's open period
    pub fn close_current(&self, owner_id: OwnerId, today: NaiveDate) -> LedgerResult<PeriodClose> {
        let current = self.current_period(owner_id, today)?;
        self.close_period(owner_id, current.id, today)
    }

    /// Close periods one by one until the open period contains `today`
    pub fn close_elapsed(&self, owner_id: OwnerId, today: NaiveDate) -> LedgerResult<Vec<PeriodClose>> {
        let mut closed = Vec::new();
        loop {
            let current = self.current_period(owner_id, today)?;
            if !current.has_elapsed(today) {
                break;
            }
            closed.push(self.close_period(owner_id, current.id, today)?);
        }
        Ok(closed)
    }

    /// The period following `period`, staged in `changes` when it is new
    fn next_period(&self, period: &BudgetPeriod, changes: &mut Changeset) -> LedgerResult<BudgetPeriod> {
        match self.find_month(period.owner_id, period.month.next())? {
            Some(existing) => Ok(existing),
            None => {
                let next = period.successor();
                changes.put_period(next.clone());
                Ok(next)
            }
        }
    }

    /// Finish a close whose rollover never landed
    fn repair(&self, mut period: BudgetPeriod) -> LedgerResult<PeriodClose> {
        warn!(period = %period.month, "closed period is missing its rollover, applying the remainder");

        let mut changes = Changeset::new();
        let next = self.next_period(&period, &mut changes)?;
        let rollovers =
            RolloverCalculator::new(self.storage, self.locks).stage(&period, &next, &mut changes)?;
        period.rollover_applied = true;
        changes.put_period(period.clone());
        self.storage.commit(changes)?;

        Ok(PeriodClose {
            closed: period,
            next,
            rollovers,
        })
    }
}
