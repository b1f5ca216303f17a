//! Serialization points for concurrent writers
//!
//! Three kinds of lock, always taken in this order:
//!
//! 1. the owner's period gate (`RwLock`): postings and allocation writes hold
//!    it shared, closing a period holds it exclusive;
//! 2. category locks, for allocation upserts;
//! 3. account locks, in ascending id order so opposite-direction transfers
//!    cannot deadlock.
//!
//! Every acquisition is bounded: each attempt waits at most the configured
//! timeout, attempts are retried with backoff, and exhaustion surfaces as
//! [`LedgerError::ConcurrencyConflict`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::LockSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountId, CategoryId, OwnerId};

/// Table size below which idle locks are never pruned
const MIN_PRUNE_AT: usize = 256;

struct LockTable<K, L> {
    locks: HashMap<K, Arc<L>>,
    prune_at: usize,
}

/// Lazily created lock per key
///
/// An entry whose `Arc` is held only by the table is idle: nobody is waiting
/// on it or holding it, and nobody can clone it while the table is locked.
/// Idle entries are dropped whenever the table doubles, so it stays
/// proportional to the keys in use.
struct KeyedLocks<K, L> {
    table: Mutex<LockTable<K, L>>,
}

impl<K: Eq + Hash + Copy, L: Default> KeyedLocks<K, L> {
    fn new() -> Self {
        Self {
            table: Mutex::new(LockTable {
                locks: HashMap::new(),
                prune_at: MIN_PRUNE_AT,
            }),
        }
    }

    fn get(&self, key: K) -> Arc<L> {
        let mut table = self.table.lock();
        if table.locks.len() >= table.prune_at && !table.locks.contains_key(&key) {
            table.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.prune_at = (table.locks.len() * 2).max(MIN_PRUNE_AT);
            debug!(live = table.locks.len(), "pruned idle locks");
        }
        table.locks.entry(key).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().locks.len()
    }
}

/// Per-owner, per-category and per-account locks
pub struct LockManager {
    settings: LockSettings,
    gates: KeyedLocks<OwnerId, RwLock<()>>,
    categories: KeyedLocks<CategoryId, Mutex<()>>,
    accounts: KeyedLocks<AccountId, Mutex<()>>,
}

impl LockManager {
    pub fn new(settings: LockSettings) -> Self {
        Self {
            settings,
            gates: KeyedLocks::new(),
            categories: KeyedLocks::new(),
            accounts: KeyedLocks::new(),
        }
    }

    /// Retry `attempt` with backoff until it yields a guard
    fn acquire<G>(
        &self,
        what: impl Fn() -> String,
        mut attempt: impl FnMut(Duration) -> Option<G>,
    ) -> LedgerResult<G> {
        let timeout = self.settings.timeout();
        for n in 0..=self.settings.retries {
            if let Some(guard) = attempt(timeout) {
                return Ok(guard);
            }
            if n < self.settings.retries {
                let backoff = self.settings.backoff(n);
                debug!(lock = %what(), attempt = n + 1, ?backoff, "lock busy, retrying");
                thread::sleep(backoff);
            }
        }
        warn!(lock = %what(), "giving up on lock acquisition");
        Err(LedgerError::ConcurrencyConflict(format!(
            "timed out waiting for {}",
            what()
        )))
    }

    /// Run `f` holding the owner's period gate shared
    pub fn shared<T>(&self, owner_id: OwnerId, f: impl FnOnce() -> LedgerResult<T>) -> LedgerResult<T> {
        let gate = self.gates.get(owner_id);
        let _guard = self.acquire(
            || format!("period gate of {}", owner_id),
            |t| gate.try_read_for(t),
        )?;
        f()
    }

    /// Run `f` holding the owner's period gate exclusively
    pub fn exclusive<T>(
        &self,
        owner_id: OwnerId,
        f: impl FnOnce() -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let gate = self.gates.get(owner_id);
        let _guard = self.acquire(
            || format!("period gate of {}", owner_id),
            |t| gate.try_write_for(t),
        )?;
        f()
    }

    /// Run `f` holding one category's lock
    pub fn with_category<T>(
        &self,
        category_id: CategoryId,
        f: impl FnOnce() -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let lock = self.categories.get(category_id);
        let _guard = self.acquire(
            || format!("category {}", category_id),
            |t| lock.try_lock_for(t),
        )?;
        f()
    }

    /// Run `f` holding the locks of every listed account
    pub fn with_accounts<T>(
        &self,
        account_ids: &[AccountId],
        f: impl FnOnce() -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut ids = account_ids.to_vec();
        ids.sort();
        ids.dedup();

        let locks: Vec<_> = ids.iter().map(|id| self.accounts.get(*id)).collect();
        let mut guards = Vec::with_capacity(locks.len());
        for (id, lock) in ids.iter().zip(&locks) {
            guards.push(self.acquire(|| format!("account {}", id), |t| lock.try_lock_for(t))?);
        }

        let result = f();
        drop(guards);
        result
    }
}
