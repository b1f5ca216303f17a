//! Display formatting for terminal output
//!
//! Tables are rendered with `tabled`; detail views are plain aligned text.

pub mod account;
pub mod budget;
pub mod category;
pub mod period;
pub mod transaction;

use std::collections::HashMap;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::{Account, AccountId, Category, CategoryId};

pub use account::{format_account_details, format_account_list};
pub use budget::{format_budget_overview, format_savings_balances};
pub use category::format_category_list;
pub use period::{format_period_close, format_period_list};
pub use transaction::format_transaction_list;

/// Render rows as a psql-style table
pub(crate) fn render<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::psql()).to_string()
}

/// Account and category names by id, for tables that only hold ids
#[derive(Debug, Default)]
pub struct Names {
    accounts: HashMap<AccountId, String>,
    categories: HashMap<CategoryId, String>,
}

impl Names {
    pub fn new(accounts: &[Account], categories: &[Category]) -> Self {
        Self {
            accounts: accounts.iter().map(|a| (a.id, a.name.clone())).collect(),
            categories: categories.iter().map(|c| (c.id, c.name.clone())).collect(),
        }
    }

    pub fn account(&self, id: AccountId) -> String {
        self.accounts
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn category(&self, id: Option<CategoryId>) -> String {
        match id {
            Some(id) => self
                .categories
                .get(&id)
                .cloned()
                .unwrap_or_else(|| id.to_string()),
            None => String::new(),
        }
    }
}
