//! Core data models for the budget ledger
//!
//! Accounts, categories, periods, budget items, transactions and rollover
//! records, plus the `Money` and ID value types they are built from.

pub mod account;
pub mod budget;
pub mod category;
pub mod ids;
pub mod money;
pub mod period;
pub mod transaction;

pub use account::{Account, AccountKind, PostingRejection};
pub use budget::{BudgetItem, CategoryActivity, CategorySummary, RolloverRecord};
pub use category::{Category, RolloverPolicy};
pub use ids::{
    AccountId, BudgetItemId, CategoryId, OwnerId, PeriodId, TransactionId, TransferId,
};
pub use money::Money;
pub use period::{BudgetPeriod, Month, PeriodStatus};
pub use transaction::{Transaction, TransactionKind, TransferResult};
