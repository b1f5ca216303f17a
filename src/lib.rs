//! budget-ledger - monthly budget ledger and rollover engine
//!
//! Tracks account balances, records income, expenses and transfers, compares
//! allocated against actual spending per category, and carries each
//! category's remaining amount into the next month according to its
//! rollover policy when a period closes.
//!
//! # Architecture
//!
//! - `config`: paths and user settings
//! - `error`: the [`LedgerError`] type
//! - `models`: accounts, categories, periods, budget items, transactions
//! - `storage`: in-memory repositories over one JSON snapshot, with atomic
//!   commits
//! - `audit`: append-only change log
//! - `services`: business rules, locking and rollover
//! - `ledger`: the [`Ledger`] facade
//! - `cli` / `display`: the `ledger` binary's commands and output
//!
//! # Example
//!
//! ```rust,ignore
//! use budget_ledger::{Ledger, config::Settings, models::*};
//!
//! let ledger = Ledger::in_memory(Settings::default());
//! let owner = OwnerId::new();
//! let checking = ledger.open_account(owner, "Checking", AccountKind::Checking, false)?;
//! let balance = ledger.get_account_balance(owner, checking.id)?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{Clock, Ledger, ManualClock, SystemClock, VerifyReport};
