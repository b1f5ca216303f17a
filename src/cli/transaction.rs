//! Transaction CLI commands

use clap::Subcommand;

use super::{parse_date, parse_date_or_today, parse_money};
use crate::display::{format_transaction_list, Names};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::models::{Money, Month, OwnerId, TransactionKind};
use crate::services::{NewTransaction, NewTransfer, TransactionFilter};

/// Transaction subcommands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record an income or expense
    Add {
        /// Account name or ID
        account: String,
        /// Amount; negative means expense unless --kind says otherwise
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// income or expense
        #[arg(short, long)]
        kind: Option<String>,
        /// Category name or ID
        #[arg(short, long)]
        category: Option<String>,
        /// Transaction date (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<String>,
        #[arg(short, long)]
        memo: Option<String>,
    },
    /// Move money between two accounts
    Transfer {
        /// Source account name or ID
        from: String,
        /// Destination account name or ID
        to: String,
        /// Amount to move
        amount: String,
        #[arg(short, long)]
        date: Option<String>,
        #[arg(short, long)]
        memo: Option<String>,
    },
    /// Offset a transaction (or a whole transfer) with a new one
    Reverse {
        /// Transaction ID
        transaction: String,
        /// Date of the reversal (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },
    /// List transactions, newest first
    List {
        #[arg(short, long)]
        account: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        /// Budget period (YYYY-MM)
        #[arg(short, long)]
        period: Option<String>,
        /// income, expense, transfer-in or transfer-out
        #[arg(short, long)]
        kind: Option<String>,
        /// Earliest date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn parse_kind(input: &str) -> LedgerResult<TransactionKind> {
    match input.to_lowercase().replace('_', "-").as_str() {
        "transfer-in" => Ok(TransactionKind::TransferIn),
        "transfer-out" => Ok(TransactionKind::TransferOut),
        other => TransactionKind::parse(other).ok_or_else(|| {
            LedgerError::Validation(format!(
                "Invalid transaction kind: '{}'. Use income or expense",
                input
            ))
        }),
    }
}

/// Sign an amount for its kind; without a kind the sign decides
fn signed_amount(amount: Money, kind: Option<TransactionKind>) -> (Money, TransactionKind) {
    match kind {
        Some(TransactionKind::Income) => (amount.abs(), TransactionKind::Income),
        Some(TransactionKind::Expense) => (-amount.abs(), TransactionKind::Expense),
        Some(other) => (amount, other),
        None if amount.is_negative() => (amount, TransactionKind::Expense),
        None => (amount, TransactionKind::Income),
    }
}

pub fn handle_transaction_command(
    ledger: &Ledger,
    owner_id: OwnerId,
    cmd: TransactionCommands,
) -> LedgerResult<()> {
    let symbol = ledger.settings().currency_symbol.clone();

    match cmd {
        TransactionCommands::Add {
            account,
            amount,
            kind,
            category,
            date,
            memo,
        } => {
            let account = ledger.find_account(owner_id, &account)?;
            let category = category
                .map(|c| ledger.find_category(owner_id, &c))
                .transpose()?;
            let kind = kind.map(|k| parse_kind(&k)).transpose()?;
            let (amount, kind) = signed_amount(parse_money(&amount)?, kind);
            let date = parse_date_or_today(date.as_deref(), ledger)?;

            let input = NewTransaction::new(account.id, category.as_ref().map(|c| c.id), amount, kind, date)
                .with_memo(memo.unwrap_or_default());
            let txn = ledger.post(owner_id, input)?;

            println!("Recorded {} of {} on '{}'", txn.kind, txn.amount.format_with_symbol(&symbol), account.name);
            if let Some(category) = category {
                println!("  Category: {}", category.name);
            }
            println!("  Date:     {}", txn.occurred_at);
            println!("  ID:       {}", txn.id);
        }

        TransactionCommands::Transfer {
            from,
            to,
            amount,
            date,
            memo,
        } => {
            let from = ledger.find_account(owner_id, &from)?;
            let to = ledger.find_account(owner_id, &to)?;
            let amount = parse_money(&amount)?;
            let date = parse_date_or_today(date.as_deref(), ledger)?;

            let input = NewTransfer::new(from.id, to.id, amount, date).with_memo(memo.unwrap_or_default());
            let result = ledger.transfer(owner_id, input)?;

            println!("Transfer recorded: {}", result.transfer_id);
            println!("  From: {} ({})", from.name, result.outflow.amount.format_with_symbol(&symbol));
            println!("  To:   {} ({})", to.name, result.inflow.amount.format_with_symbol(&symbol));
            println!("  Date: {}", date);
        }

        TransactionCommands::Reverse { transaction, date } => {
            let original = ledger.find_transaction(owner_id, &transaction)?;
            let date = parse_date_or_today(date.as_deref(), ledger)?;
            let created = ledger.reverse_transaction(owner_id, original.id, date)?;

            println!("Reversed {}", original.id);
            for txn in &created {
                println!("  {} {} ({})", txn.id, txn.kind, txn.amount.format_with_symbol(&symbol));
            }
        }

        TransactionCommands::List {
            account,
            category,
            period,
            kind,
            from,
            to,
            limit,
        } => {
            let mut filter = TransactionFilter::new().limit(limit);
            if let Some(account) = account {
                filter = filter.account(ledger.find_account(owner_id, &account)?.id);
            }
            if let Some(category) = category {
                filter = filter.category(ledger.find_category(owner_id, &category)?.id);
            }
            if let Some(period) = period {
                let month = Month::parse(&period).map_err(|e| LedgerError::Validation(e.to_string()))?;
                filter = filter.period(ledger.period_for_month(owner_id, month)?.id);
            }
            if let Some(kind) = kind {
                filter = filter.kind(parse_kind(&kind)?);
            }
            filter.from = from.as_deref().map(parse_date).transpose()?;
            filter.to = to.as_deref().map(parse_date).transpose()?;

            let transactions = ledger.list_transactions(owner_id, &filter)?;
            let names = Names::new(
                &ledger.list_accounts(owner_id, true)?,
                &ledger.list_categories(owner_id)?,
            );
            print!("{}", format_transaction_list(&transactions, &names, &symbol));
        }
    }

    Ok(())
}
