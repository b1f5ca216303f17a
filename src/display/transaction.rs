//! Transaction list formatting

use tabled::Tabled;

use super::{render, Names};
use crate::models::Transaction;

#[derive(Tabled)]
struct TransactionRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Memo")]
    memo: String,
    #[tabled(rename = "ID")]
    id: String,
}

pub fn format_transaction_list(transactions: &[Transaction], names: &Names, symbol: &str) -> String {
    if transactions.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let rows = transactions
        .iter()
        .map(|t| TransactionRow {
            date: t.occurred_at.to_string(),
            account: names.account(t.account_id),
            kind: if t.is_reversal() {
                format!("{} (reversal)", t.kind)
            } else {
                t.kind.to_string()
            },
            category: names.category(t.category_id),
            amount: t.amount.format_with_symbol(symbol),
            memo: t.memo.clone(),
            id: t.id.to_string(),
        })
        .collect();
    format!("{}\n", render(rows))
}
