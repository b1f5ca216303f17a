//! Service layer for the budget ledger
//!
//! Services own the business rules on top of the storage layer: validation,
//! locking, period resolution and rollover. Each one borrows the shared
//! [`Storage`](crate::storage::Storage) and [`LockManager`], stages its rows
//! in a changeset, and commits once.

pub mod account;
pub mod budget;
pub mod category;
pub mod locks;
pub mod period;
pub mod rollover;
pub mod transaction;
pub mod transfer;

pub use account::AccountService;
pub use budget::{BudgetLine, BudgetOverview, BudgetService, SavingsBalance};
pub use category::CategoryService;
pub use locks::LockManager;
pub use period::{PeriodClose, PeriodService};
pub use rollover::RolloverCalculator;
pub use transaction::{NewTransaction, TransactionFilter, TransactionService};
pub use transfer::{NewTransfer, TransferService};
