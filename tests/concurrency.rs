//! Concurrent postings, transfers and period closes

use std::sync::{Arc, Barrier};
use std::thread;

use budget_ledger::config::Settings;
use budget_ledger::models::{AccountKind, Money, OwnerId, TransactionKind};
use budget_ledger::{Ledger, LedgerError, ManualClock};
use chrono::NaiveDate;

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

/// Lock waits generous enough that nothing here times out
fn patient_settings() -> Settings {
    let mut settings = Settings::default();
    settings.locking.timeout_ms = 2000;
    settings.locking.retries = 5;
    settings
}

fn ledger_on(today: NaiveDate) -> (Arc<Ledger>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(today));
    let ledger = Ledger::in_memory(patient_settings()).with_clock(clock.clone());
    (Arc::new(ledger), clock)
}

#[test]
fn test_competing_withdrawals_never_overdraw() {
    for _ in 0..20 {
        let (ledger, _) = ledger_on(jan(5));
        let owner = OwnerId::new();
        let account = ledger
            .open_account(owner, "Checking", AccountKind::Checking, false)
            .unwrap();
        ledger
            .post_transaction(owner, account.id, None, Money::from_minor(120000), TransactionKind::Income, jan(5))
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [100000, 50000]
            .into_iter()
            .map(|amount| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.post_transaction(
                        owner,
                        account.id,
                        None,
                        Money::from_minor(-amount),
                        TransactionKind::Expense,
                        jan(6),
                    )
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. }))));

        let balance = ledger.get_account_balance(owner, account.id).unwrap();
        assert!(balance == Money::from_minor(20000) || balance == Money::from_minor(70000));
        assert!(ledger.verify(owner).unwrap().is_ok());
    }
}

#[test]
fn test_opposite_transfers_do_not_deadlock() {
    let (ledger, _) = ledger_on(jan(5));
    let owner = OwnerId::new();
    let a = ledger.open_account(owner, "A", AccountKind::Checking, false).unwrap();
    let b = ledger.open_account(owner, "B", AccountKind::Savings, false).unwrap();
    for account in [&a, &b] {
        ledger
            .post_transaction(owner, account.id, None, Money::from_minor(1_000_000), TransactionKind::Income, jan(5))
            .unwrap();
    }

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..25 {
                    ledger
                        .post_transfer(owner, from, to, Money::from_minor(100), jan(6))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = ledger.get_account_balance(owner, a.id).unwrap()
        + ledger.get_account_balance(owner, b.id).unwrap();
    assert_eq!(total, Money::from_minor(2_000_000));
    let report = ledger.verify(owner).unwrap();
    assert!(report.is_ok(), "{:?}", report.problems);
    assert_eq!(report.transactions_checked, 2 + threads * 25 * 2);
}

#[test]
fn test_posting_racing_a_close_lands_before_or_is_rejected() {
    for _ in 0..20 {
        let (ledger, clock) = ledger_on(jan(5));
        let owner = OwnerId::new();
        let account = ledger
            .open_account(owner, "Checking", AccountKind::Checking, false)
            .unwrap();
        let food = ledger.create_category(owner, "Food", None).unwrap();
        let january = ledger.current_period(owner).unwrap();
        ledger
            .set_allocation(owner, january.id, food.id, Money::from_minor(10000))
            .unwrap();
        ledger
            .post_transaction(owner, account.id, None, Money::from_minor(50000), TransactionKind::Income, jan(5))
            .unwrap();
        clock.set(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());

        let barrier = Arc::new(Barrier::new(2));
        let poster = {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.post_transaction(
                    owner,
                    account.id,
                    Some(food.id),
                    Money::from_minor(-4000),
                    TransactionKind::Expense,
                    jan(31),
                )
            })
        };
        let closer = {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.close_period(owner, january.id)
            })
        };

        let posted = poster.join().unwrap();
        let closed = closer.join().unwrap().unwrap();

        let carried = closed
            .rollovers
            .iter()
            .find(|r| r.category_id == food.id)
            .map(|r| r.carried)
            .unwrap();
        match posted {
            Ok(_) => assert_eq!(carried, Money::from_minor(6000)),
            Err(LedgerError::PeriodClosed { .. }) => assert_eq!(carried, Money::from_minor(10000)),
            Err(other) => panic!("unexpected error: {}", other),
        }
        assert!(ledger.verify(owner).unwrap().is_ok());
    }
}
