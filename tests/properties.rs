//! Property-based checks: balances always match history, incremental
//! summaries always match a recompute, transfers stay balanced, and closes
//! carry exactly what each policy allows

use std::sync::Arc;

use budget_ledger::config::Settings;
use budget_ledger::models::{AccountKind, Money, Month, OwnerId, RolloverPolicy, TransactionKind};
use budget_ledger::{Ledger, ManualClock};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Income { account: usize, amount: i64 },
    Expense { account: usize, category: usize, amount: i64 },
    Transfer { from: usize, to: usize, amount: i64 },
    Reverse { nth: usize },
    Allocate { category: usize, amount: i64 },
    Close,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 1i64..200_000).prop_map(|(account, amount)| Op::Income { account, amount }),
        (0usize..3, 0usize..3, 1i64..200_000)
            .prop_map(|(account, category, amount)| Op::Expense { account, category, amount }),
        (0usize..3, 0usize..3, 1i64..200_000)
            .prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
        (0usize..50).prop_map(|nth| Op::Reverse { nth }),
        (0usize..3, 0i64..300_000).prop_map(|(category, amount)| Op::Allocate { category, amount }),
        Just(Op::Close),
    ]
}

fn march() -> Month {
    Month::new(2025, 3).unwrap()
}

fn day_in(month: Month, d: u32) -> NaiveDate {
    month.start_date() + Duration::days(i64::from(d) - 1)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any sequence of operations, accepted or rejected, leaves every
    /// balance equal to its history and every summary equal to a recompute
    #[test]
    fn prop_ledger_stays_consistent(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let clock = Arc::new(ManualClock::new(march().start_date()));
        let ledger = Ledger::in_memory(Settings::default()).with_clock(clock.clone());
        let owner = OwnerId::new();

        let accounts: Vec<_> = [
            ("Checking", AccountKind::Checking, false),
            ("Savings", AccountKind::Savings, false),
            ("Card", AccountKind::Checking, true),
        ]
        .iter()
        .map(|(name, kind, overdraft)| ledger.open_account(owner, name, *kind, *overdraft).unwrap())
        .collect();
        let categories: Vec<_> = [RolloverPolicy::CarryUnspent, RolloverPolicy::CarryBoth, RolloverPolicy::NoCarry]
            .iter()
            .enumerate()
            .map(|(i, policy)| ledger.create_category(owner, &format!("Cat {}", i), Some(*policy)).unwrap())
            .collect();
        let mut period = ledger.current_period(owner).unwrap();

        let mut posted = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            let date = day_in(period.month, 1 + (i as u32 % 28));
            match op {
                Op::Income { account, amount } => {
                    if let Ok(id) = ledger.post_transaction(owner, accounts[*account].id, None, Money::from_minor(*amount), TransactionKind::Income, date) {
                        posted.push(id);
                    }
                }
                Op::Expense { account, category, amount } => {
                    if let Ok(id) = ledger.post_transaction(
                        owner,
                        accounts[*account].id,
                        Some(categories[*category].id),
                        Money::from_minor(-amount),
                        TransactionKind::Expense,
                        date,
                    ) {
                        posted.push(id);
                    }
                }
                Op::Transfer { from, to, amount } => {
                    let _ = ledger.post_transfer(owner, accounts[*from].id, accounts[*to].id, Money::from_minor(*amount), date);
                }
                Op::Reverse { nth } => {
                    if !posted.is_empty() {
                        let _ = ledger.reverse_transaction(owner, posted[nth % posted.len()], date);
                    }
                }
                Op::Allocate { category, amount } => {
                    ledger.set_allocation(owner, period.id, categories[*category].id, Money::from_minor(*amount)).unwrap();
                }
                Op::Close => {
                    clock.set(period.month.next().start_date());
                    let closes = ledger.close_elapsed_periods(owner).unwrap();
                    prop_assert_eq!(closes.len(), 1);
                    prop_assert_eq!(closes[0].closed.id, period.id);
                    period = ledger.current_period(owner).unwrap();
                    prop_assert_eq!(period.id, closes[0].next.id);
                }
            }
        }

        let report = ledger.verify(owner).unwrap();
        prop_assert!(report.is_ok(), "{:?}", report.problems);

        for account in &accounts {
            let cached = ledger.get_account_balance(owner, account.id).unwrap();
            let rebuilt = ledger.balance_as_of(owner, account.id, chrono::Utc::now()).unwrap();
            prop_assert_eq!(cached, rebuilt);
            if !account.allow_negative {
                prop_assert!(!cached.is_negative());
            }
        }

        let periods = ledger.list_periods(owner).unwrap();
        for p in &periods {
            for summary in ledger.get_budget_summary(owner, p.id).unwrap() {
                prop_assert_eq!(summary.remaining, summary.allocated + summary.rolled_in - summary.actual);
                let rebuilt = ledger.recompute_summary(owner, p.id, summary.category_id).unwrap();
                prop_assert_eq!(&summary, &rebuilt);
            }
        }

        // Each close carried exactly the policy's share of the final remaining
        for pair in periods.windows(2) {
            let (closed, next) = (&pair[0], &pair[1]);
            prop_assert!(!closed.is_open() && closed.rollover_applied);
            for category in &categories {
                let final_remaining = ledger.category_summary(owner, closed.id, category.id).unwrap().remaining;
                let rolled_in = ledger.category_summary(owner, next.id, category.id).unwrap().rolled_in;
                prop_assert_eq!(rolled_in, category.rollover_policy.carry(final_remaining));
            }
        }
        prop_assert!(periods.last().map_or(false, |p| p.is_open()));
    }

    /// The carried amount follows the policy for any remaining value
    #[test]
    fn prop_carry_matches_policy(remaining in -1_000_000i64..1_000_000) {
        let remaining = Money::from_minor(remaining);
        prop_assert_eq!(RolloverPolicy::CarryUnspent.carry(remaining), remaining.max(Money::ZERO));
        prop_assert_eq!(RolloverPolicy::CarryDeficit.carry(remaining), remaining.min(Money::ZERO));
        prop_assert_eq!(RolloverPolicy::CarryBoth.carry(remaining), remaining);
        prop_assert_eq!(RolloverPolicy::NoCarry.carry(remaining), Money::ZERO);
    }
}
