//! CLI command handlers
//!
//! This module bridges the clap argument parsing with the [`Ledger`]
//! facade. Handlers print their results and return [`LedgerResult`].
//!
//! [`Ledger`]: crate::ledger::Ledger

pub mod account;
pub mod budget;
pub mod category;
pub mod period;
pub mod transaction;

use chrono::NaiveDate;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Ledger, VerifyReport};
use crate::models::{BudgetPeriod, Money, Month, OwnerId};

pub use account::{handle_account_command, AccountCommands};
pub use budget::{handle_budget_command, BudgetCommands};
pub use category::{handle_category_command, CategoryCommands};
pub use period::{handle_period_command, PeriodCommands};
pub use transaction::{handle_transaction_command, TransactionCommands};

/// Parse a user-entered amount such as "12.34" or "-5"
pub(crate) fn parse_money(input: &str) -> LedgerResult<Money> {
    Money::parse(input).map_err(|e| {
        LedgerError::Validation(format!(
            "Invalid amount: '{}'. Use a format like '100.00' or '100'. Error: {}",
            input, e
        ))
    })
}

pub(crate) fn parse_date(input: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        LedgerError::Validation(format!("Invalid date format: '{}'. Use YYYY-MM-DD", input))
    })
}

pub(crate) fn parse_date_or_today(input: Option<&str>, ledger: &Ledger) -> LedgerResult<NaiveDate> {
    match input {
        Some(s) => parse_date(s),
        None => Ok(ledger.today()),
    }
}

/// The period named by `--period YYYY-MM`, or the current one
pub(crate) fn resolve_period(
    ledger: &Ledger,
    owner_id: OwnerId,
    period: Option<&str>,
) -> LedgerResult<BudgetPeriod> {
    match period {
        Some(s) => {
            let month = Month::parse(s).map_err(|e| LedgerError::Validation(e.to_string()))?;
            ledger.period_for_month(owner_id, month)
        }
        None => ledger.current_period(owner_id),
    }
}

/// Handle `ledger audit`
pub fn handle_audit_command(ledger: &Ledger, owner_id: OwnerId, limit: usize) -> LedgerResult<()> {
    let entries = ledger.audit_history(owner_id, limit)?;
    if entries.is_empty() {
        println!("No audit entries.");
    }
    for entry in entries {
        println!("{}", entry.format_human_readable());
    }
    Ok(())
}

/// Handle `ledger verify`; an unhealthy ledger is an error
pub fn handle_verify_command(ledger: &Ledger, owner_id: OwnerId) -> LedgerResult<()> {
    let report = ledger.verify(owner_id)?;
    print!("{}", format_verify_report(&report));
    if report.is_ok() {
        Ok(())
    } else {
        Err(LedgerError::InvariantViolation(format!(
            "{} problem(s) found",
            report.problems.len()
        )))
    }
}

fn format_verify_report(report: &VerifyReport) -> String {
    let mut output = format!(
        "Checked {} account(s), {} period(s), {} transaction(s)\n",
        report.accounts_checked, report.periods_checked, report.transactions_checked
    );
    if report.is_ok() {
        output.push_str("Ledger is consistent.\n");
    } else {
        for problem in &report.problems {
            output.push_str(&format!("  ! {}\n", problem));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money_and_date() {
        assert_eq!(parse_money("12.34").unwrap(), Money::from_minor(1234));
        assert!(parse_money("twelve").unwrap_err().is_validation());
        assert_eq!(
            parse_date("2025-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        assert!(parse_date("31/01/2025").is_err());
    }

    #[test]
    fn test_verify_report_text() {
        let clean = VerifyReport {
            accounts_checked: 2,
            ..VerifyReport::default()
        };
        assert!(format_verify_report(&clean).contains("consistent"));

        let broken = VerifyReport {
            problems: vec!["gap between periods 2025-01 and 2025-03".into()],
            ..VerifyReport::default()
        };
        assert!(format_verify_report(&broken).contains("! gap"));
    }
}
