//! Period CLI commands

use clap::Subcommand;

use super::resolve_period;
use crate::display::{format_period_close, format_period_list, Names};
use crate::error::LedgerResult;
use crate::ledger::Ledger;
use crate::models::OwnerId;

/// Period subcommands
#[derive(Subcommand)]
pub enum PeriodCommands {
    /// Show the open period
    Current,
    /// List all periods
    List,
    /// Close a period and roll its budget forward
    Close {
        /// Period to close (YYYY-MM); defaults to the open period
        #[arg(short, long)]
        period: Option<String>,
    },
    /// Close every elapsed period up to today
    Roll,
}

pub fn handle_period_command(ledger: &Ledger, owner_id: OwnerId, cmd: PeriodCommands) -> LedgerResult<()> {
    let symbol = &ledger.settings().currency_symbol;

    match cmd {
        PeriodCommands::Current => {
            let period = ledger.current_period(owner_id)?;
            println!("Current period: {}", period.month);
            println!("  From:   {}", period.start_date);
            println!("  To:     {}", period.end_date);
            println!("  Status: {}", period.status);
            if period.has_elapsed(ledger.today()) {
                println!("  This period has ended; run 'ledger period roll' to close it.");
            }
        }

        PeriodCommands::List => {
            print!("{}", format_period_list(&ledger.list_periods(owner_id)?));
        }

        PeriodCommands::Close { period } => {
            let period = resolve_period(ledger, owner_id, period.as_deref())?;
            let closed = ledger.close_period(owner_id, period.id)?;
            let names = Names::new(&[], &ledger.list_categories(owner_id)?);
            print!("{}", format_period_close(&closed, &names, symbol));
        }

        PeriodCommands::Roll => {
            let closed = ledger.close_elapsed_periods(owner_id)?;
            if closed.is_empty() {
                println!("Nothing to close; the open period contains today.");
            }
            let names = Names::new(&[], &ledger.list_categories(owner_id)?);
            for close in &closed {
                print!("{}", format_period_close(close, &names, symbol));
            }
        }
    }

    Ok(())
}
