//! Budget overview formatting

use tabled::Tabled;

use super::render;
use crate::services::{BudgetOverview, SavingsBalance};

#[derive(Tabled)]
struct BudgetRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Allocated")]
    allocated: String,
    #[tabled(rename = "Rolled in")]
    rolled_in: String,
    #[tabled(rename = "Income")]
    income: String,
    #[tabled(rename = "Expense")]
    expense: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
}

/// Format one period's budget, with totals and an overspent warning
pub fn format_budget_overview(overview: &BudgetOverview, symbol: &str) -> String {
    let mut output = format!(
        "Budget for {} ({} to {}, {})\n",
        overview.period.month,
        overview.period.start_date,
        overview.period.end_date,
        overview.period.status
    );

    if overview.lines.is_empty() {
        output.push_str("No categories found.\n");
        return output;
    }

    let money = |m: crate::models::Money| m.format_with_symbol(symbol);
    let mut rows: Vec<BudgetRow> = overview
        .lines
        .iter()
        .map(|line| BudgetRow {
            category: line.category.name.clone(),
            allocated: money(line.summary.allocated),
            rolled_in: money(line.summary.rolled_in),
            income: money(line.summary.income),
            expense: money(line.summary.expense),
            actual: money(line.summary.actual),
            remaining: money(line.summary.remaining),
        })
        .collect();
    rows.push(BudgetRow {
        category: "TOTAL".into(),
        allocated: money(overview.total_allocated),
        rolled_in: money(overview.total_rolled_in),
        income: String::new(),
        expense: String::new(),
        actual: money(overview.total_actual),
        remaining: money(overview.total_remaining),
    });
    output.push_str(&render(rows));
    output.push('\n');

    let overspent: Vec<&str> = overview
        .overspent()
        .map(|l| l.category.name.as_str())
        .collect();
    if !overspent.is_empty() {
        output.push_str(&format!("Overspent: {}\n", overspent.join(", ")));
    }
    output
}

#[derive(Tabled)]
struct SavingsRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Funded")]
    funded: String,
    #[tabled(rename = "Spent")]
    spent: String,
    #[tabled(rename = "Available")]
    available: String,
}

pub fn format_savings_balances(balances: &[SavingsBalance], symbol: &str) -> String {
    if balances.is_empty() {
        return "No savings activity.\n".to_string();
    }

    let rows = balances
        .iter()
        .map(|b| SavingsRow {
            category: b.category.name.clone(),
            funded: b.funded.format_with_symbol(symbol),
            spent: b.spent.format_with_symbol(symbol),
            available: b.available.format_with_symbol(symbol),
        })
        .collect();
    format!("{}\n", render(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Money, OwnerId, RolloverPolicy};

    #[test]
    fn test_savings_table() {
        let balance = SavingsBalance {
            category: Category::new(OwnerId::new(), "Vacation", RolloverPolicy::CarryBoth),
            funded: Money::from_minor(70000),
            spent: Money::from_minor(25000),
            available: Money::from_minor(45000),
        };
        let output = format_savings_balances(&[balance], "$");
        assert!(output.contains("Vacation"));
        assert!(output.contains("$450.00"));
        assert_eq!(format_savings_balances(&[], "$"), "No savings activity.\n");
    }
}
