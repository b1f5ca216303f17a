//! Period and rollover formatting

use tabled::Tabled;

use super::{render, Names};
use crate::models::BudgetPeriod;
use crate::services::PeriodClose;

#[derive(Tabled)]
struct PeriodRow {
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "From")]
    start: String,
    #[tabled(rename = "To")]
    end: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Rolled over")]
    rolled_over: String,
}

#[derive(Tabled)]
struct RolloverRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Policy")]
    policy: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
    #[tabled(rename = "Carried")]
    carried: String,
}

pub fn format_period_list(periods: &[BudgetPeriod]) -> String {
    if periods.is_empty() {
        return "No periods yet.\n".to_string();
    }

    let rows = periods
        .iter()
        .map(|p| PeriodRow {
            month: p.month.to_string(),
            start: p.start_date.to_string(),
            end: p.end_date.to_string(),
            status: p.status.to_string(),
            rolled_over: if p.rollover_applied { "Yes".into() } else { String::new() },
        })
        .collect();
    format!("{}\n", render(rows))
}

/// Describe a close and what each category carried forward
pub fn format_period_close(close: &PeriodClose, names: &Names, symbol: &str) -> String {
    let mut output = format!(
        "Closed {}; {} is now open.\n",
        close.closed.month, close.next.month
    );
    if close.rollovers.is_empty() {
        return output;
    }

    let rows = close
        .rollovers
        .iter()
        .map(|r| RolloverRow {
            category: names.category(Some(r.category_id)),
            policy: r.policy.to_string(),
            remaining: r.remaining.format_with_symbol(symbol),
            carried: r.carried.format_with_symbol(symbol),
        })
        .collect();
    output.push_str(&render(rows));
    output.push('\n');
    output
}
