//! Budget CLI commands

use clap::Subcommand;

use super::{parse_money, resolve_period};
use crate::display::{format_budget_overview, format_savings_balances};
use crate::error::LedgerResult;
use crate::ledger::Ledger;
use crate::models::OwnerId;

/// Budget subcommands
#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set a category's allocation for a period
    Set {
        /// Category name or ID
        category: String,
        /// Amount (e.g., "100" or "100.00")
        amount: String,
        /// Budget period (YYYY-MM); defaults to the open period
        #[arg(short, long)]
        period: Option<String>,
    },
    /// Show allocated vs. actual for a period
    Show {
        /// Budget period (YYYY-MM); defaults to the open period
        #[arg(short, long)]
        period: Option<String>,
    },
    /// Show what each category has set aside and drawn from savings
    Savings {
        /// Limit to one category (name or ID)
        category: Option<String>,
    },
}

pub fn handle_budget_command(ledger: &Ledger, owner_id: OwnerId, cmd: BudgetCommands) -> LedgerResult<()> {
    let symbol = &ledger.settings().currency_symbol;

    match cmd {
        BudgetCommands::Set {
            category,
            amount,
            period,
        } => {
            let category = ledger.find_category(owner_id, &category)?;
            let period = resolve_period(ledger, owner_id, period.as_deref())?;
            let amount = parse_money(&amount)?;

            let item = ledger.set_allocation(owner_id, period.id, category.id, amount)?;
            println!(
                "Allocated {} to '{}' for {}",
                item.allocated.format_with_symbol(symbol),
                category.name,
                period.month
            );
        }

        BudgetCommands::Show { period } => {
            let period = resolve_period(ledger, owner_id, period.as_deref())?;
            let overview = ledger.budget_overview(owner_id, period.id)?;
            print!("{}", format_budget_overview(&overview, symbol));
        }

        BudgetCommands::Savings { category } => {
            let balances = match category {
                Some(identifier) => {
                    let category = ledger.find_category(owner_id, &identifier)?;
                    vec![ledger.savings_balance(owner_id, category.id)?]
                }
                None => ledger.savings_balances(owner_id)?,
            };
            print!("{}", format_savings_balances(&balances, symbol));
        }
    }

    Ok(())
}
