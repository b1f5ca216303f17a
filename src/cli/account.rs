//! Account CLI commands

use chrono::{DateTime, Utc};
use clap::Subcommand;

use super::parse_date;
use crate::display::{format_account_details, format_account_list, format_transaction_list, Names};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::models::{AccountKind, OwnerId};
use crate::services::TransactionFilter;

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account with a zero balance
    Open {
        /// Account name
        name: String,
        /// Account kind (checking, savings)
        #[arg(short, long, default_value = "checking")]
        kind: String,
        /// Allow the balance to go below zero
        #[arg(long)]
        allow_negative: bool,
    },
    /// List accounts
    List {
        /// Include closed accounts
        #[arg(short, long)]
        all: bool,
    },
    /// Show account details
    Show {
        /// Account name or ID
        account: String,
        /// Also show the balance rebuilt from history up to this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Soft-close an account
    Close {
        /// Account name or ID
        account: String,
    },
    /// Show an account's transactions
    History {
        /// Account name or ID
        account: String,
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Handle an account command
pub fn handle_account_command(ledger: &Ledger, owner_id: OwnerId, cmd: AccountCommands) -> LedgerResult<()> {
    let symbol = ledger.settings().currency_symbol.clone();

    match cmd {
        AccountCommands::Open {
            name,
            kind,
            allow_negative,
        } => {
            let kind = AccountKind::parse(&kind).ok_or_else(|| {
                LedgerError::Validation(format!(
                    "Invalid account kind: '{}'. Valid kinds: checking, savings",
                    kind
                ))
            })?;
            let account = ledger.open_account(owner_id, &name, kind, allow_negative)?;
            println!("Opened account: {}", account.name);
            println!("  Kind: {}", account.kind);
            println!("  ID:   {}", account.id);
        }

        AccountCommands::List { all } => {
            let accounts = ledger.list_accounts(owner_id, all)?;
            print!("{}", format_account_list(&accounts, &symbol));
        }

        AccountCommands::Show { account, as_of } => {
            let found = ledger.find_account(owner_id, &account)?;
            let history = ledger.list_transactions(owner_id, &TransactionFilter::new().account(found.id))?;
            print!("{}", format_account_details(&found, history.len(), &symbol));

            if let Some(date) = as_of {
                let date = parse_date(&date)?;
                let end_of_day = date
                    .and_hms_opt(23, 59, 59)
                    .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                    .ok_or_else(|| LedgerError::Validation(format!("Invalid date: {}", date)))?;
                let balance = ledger.balance_as_of(owner_id, found.id, end_of_day)?;
                println!("  Balance as of {}: {}", date, balance.format_with_symbol(&symbol));
            }
        }

        AccountCommands::Close { account } => {
            let found = ledger.find_account(owner_id, &account)?;
            let closed = ledger.close_account(owner_id, found.id)?;
            println!("Closed account: {}", closed.name);
        }

        AccountCommands::History { account, limit } => {
            let found = ledger.find_account(owner_id, &account)?;
            let transactions = ledger.list_transactions(
                owner_id,
                &TransactionFilter::new().account(found.id).limit(limit),
            )?;
            let names = Names::new(&[found], &ledger.list_categories(owner_id)?);
            print!("{}", format_transaction_list(&transactions, &names, &symbol));
        }
    }

    Ok(())
}
