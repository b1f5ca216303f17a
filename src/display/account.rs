//! Account display formatting

use tabled::Tabled;

use super::render;
use crate::models::{Account, Money};

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "ID")]
    id: String,
}

/// Format a list of accounts with a total line
pub fn format_account_list(accounts: &[Account], symbol: &str) -> String {
    if accounts.is_empty() {
        return "No accounts found.\n".to_string();
    }

    let rows = accounts
        .iter()
        .map(|a| AccountRow {
            name: a.name.clone(),
            kind: a.kind.to_string(),
            balance: a.balance.format_with_symbol(symbol),
            status: if a.closed {
                "Closed".into()
            } else if a.allow_negative {
                "Overdraft allowed".into()
            } else {
                String::new()
            },
            id: a.id.to_string(),
        })
        .collect();

    let total: Money = accounts.iter().filter(|a| !a.closed).map(|a| a.balance).sum();
    format!(
        "{}\nTotal (open accounts): {}\n",
        render(rows),
        total.format_with_symbol(symbol)
    )
}

/// Format a single account's details
pub fn format_account_details(account: &Account, transaction_count: usize, symbol: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("Account: {}\n", account.name));
    output.push_str(&format!("  Kind:            {}\n", account.kind));
    output.push_str(&format!("  ID:              {}\n", account.id));
    output.push_str(&format!(
        "  Balance:         {}\n",
        account.balance.format_with_symbol(symbol)
    ));
    output.push_str(&format!(
        "  Overdraft:       {}\n",
        if account.allow_negative { "Allowed" } else { "No" }
    ));
    output.push_str(&format!(
        "  Closed:          {}\n",
        if account.closed { "Yes" } else { "No" }
    ));
    output.push_str(&format!("  Transactions:    {}\n", transaction_count));
    output.push_str(&format!(
        "  Opened:          {}\n",
        account.created_at.format("%Y-%m-%d")
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, OwnerId};

    #[test]
    fn test_empty_list() {
        assert_eq!(format_account_list(&[], "$"), "No accounts found.\n");
    }

    #[test]
    fn test_list_total_skips_closed() {
        let owner = OwnerId::new();
        let mut open = Account::new(owner, "Checking", AccountKind::Checking);
        open.balance = Money::from_minor(1500);
        let mut closed = Account::new(owner, "Old", AccountKind::Savings);
        closed.balance = Money::from_minor(900);
        closed.close();

        let output = format_account_list(&[open, closed], "€");
        assert!(output.contains("Checking"));
        assert!(output.contains("Closed"));
        assert!(output.contains("Total (open accounts): €15.00"));
    }
}
