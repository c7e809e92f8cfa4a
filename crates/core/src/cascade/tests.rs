//! Cascade propagation tests against the in-memory store.

use moneyflow_shared::LedgerConfig;
use moneyflow_shared::types::UserId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::ledger::balance::audit_chain;
use crate::ledger::{FaultPoint, FlowDelta, InMemoryBalanceStore, PeriodBalance};

fn monthly(text: &str) -> PeriodKey {
    PeriodKey::parse(Granularity::Monthly, text).unwrap()
}

fn income(cash: Decimal) -> FlowDelta {
    FlowDelta {
        income: CashBank::new(cash, Decimal::ZERO),
        ..FlowDelta::default()
    }
}

/// A row with `income` cash and an opening balance that may be stale.
fn row(user: UserId, key: &str, income_cash: Decimal, previous_cash: Decimal) -> PeriodBalance {
    let mut row =
        PeriodBalance::seeded(user, monthly(key), CashBank::new(previous_cash, dec!(0))).unwrap();
    row.apply_delta(&income(income_cash)).unwrap();
    row
}

async fn store_with(rows: Vec<PeriodBalance>) -> InMemoryBalanceStore {
    let store = InMemoryBalanceStore::new();
    for row in rows {
        store.insert_raw(row).await;
    }
    store
}

fn policy_with(monthly_horizon: u32, max_rows: u64) -> LedgerPolicy {
    let mut config = LedgerConfig::default();
    config.horizons.monthly = monthly_horizon;
    config.max_rows_per_cascade = max_rows;
    LedgerPolicy::from_config(&config)
}

#[tokio::test]
async fn test_rechains_across_gaps() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-03", dec!(10), dec!(0)),
        row(user, "2024-06", dec!(1), dec!(0)),
    ])
    .await;
    let policy = LedgerPolicy::default();

    let report = resume(&store, &policy, user, monthly("2024-01")).await.unwrap();
    assert_eq!(report.visited, 2);
    assert_eq!(report.updated, 2);
    assert!(!report.truncated);
    assert_eq!(report.through, monthly("2029-01"));

    let march = store.get(user, monthly("2024-03")).await.unwrap().unwrap();
    assert_eq!(march.previous_cash_amount, dec!(100));
    assert_eq!(march.balance_cash_amount, dec!(110));
    let june = store.get(user, monthly("2024-06")).await.unwrap().unwrap();
    assert_eq!(june.previous_cash_amount, dec!(110));
    assert_eq!(june.total_balance, dec!(111));

    // No placeholder rows for the gaps
    assert_eq!(store.len().await, 3);
    let rows = store.list(user, Granularity::Monthly).await.unwrap();
    assert!(audit_chain(&rows).is_empty());
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-02", dec!(-30), dec!(0)),
        row(user, "2024-05", dec!(7), dec!(0)),
    ])
    .await;
    let policy = LedgerPolicy::default();

    resume(&store, &policy, user, monthly("2024-01")).await.unwrap();
    let before = store.list(user, Granularity::Monthly).await.unwrap();

    let again = resume(&store, &policy, user, monthly("2024-01")).await.unwrap();
    assert_eq!(again.visited, 2);
    assert_eq!(again.updated, 0);
    assert_eq!(store.list(user, Granularity::Monthly).await.unwrap(), before);
}

#[tokio::test]
async fn test_only_changed_rows_are_written() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-02", dec!(5), dec!(100)),
        row(user, "2024-03", dec!(5), dec!(0)),
    ])
    .await;

    // February already chains correctly, March is stale
    let report = resume(&store, &LedgerPolicy::default(), user, monthly("2024-01"))
        .await
        .unwrap();
    assert_eq!(report.visited, 2);
    assert_eq!(report.updated, 1);
    let march = store.get(user, monthly("2024-03")).await.unwrap().unwrap();
    assert_eq!(march.previous_cash_amount, dec!(105));
}

#[tokio::test]
async fn test_stops_at_horizon() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-03", dec!(1), dec!(0)),
        row(user, "2024-04", dec!(1), dec!(0)),
    ])
    .await;
    let policy = policy_with(2, 5000);

    let report = resume(&store, &policy, user, monthly("2024-01")).await.unwrap();
    assert_eq!(report.through, monthly("2024-03"));
    assert_eq!(report.visited, 1);

    let april = store.get(user, monthly("2024-04")).await.unwrap().unwrap();
    assert_eq!(april.previous_cash_amount, dec!(0));
    // rebuild is the repair path past the horizon
    let rows = store.list(user, Granularity::Monthly).await.unwrap();
    assert_eq!(audit_chain(&rows).len(), 1);
}

#[tokio::test]
async fn test_row_cap_truncates() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-02", dec!(1), dec!(0)),
        row(user, "2024-03", dec!(1), dec!(0)),
        row(user, "2024-04", dec!(1), dec!(0)),
    ])
    .await;
    let policy = policy_with(60, 2);

    let report = resume(&store, &policy, user, monthly("2024-01")).await.unwrap();
    assert!(report.truncated);
    assert_eq!(report.visited, 2);
    assert_eq!(report.updated, 2);

    let april = store.get(user, monthly("2024-04")).await.unwrap().unwrap();
    assert_eq!(april.previous_cash_amount, dec!(0));
}

#[tokio::test]
async fn test_exact_cap_is_not_truncated() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-02", dec!(1), dec!(0)),
        row(user, "2024-03", dec!(1), dec!(0)),
    ])
    .await;

    let report = resume(&store, &policy_with(60, 2), user, monthly("2024-01"))
        .await
        .unwrap();
    assert!(!report.truncated);
    assert_eq!(report.visited, 2);
}

#[tokio::test]
async fn test_corrupt_row_stops_the_walk() {
    let user = UserId::new();
    let mut corrupt = row(user, "2024-03", dec!(1), dec!(0));
    corrupt.balance_bank_amount = dec!(42);
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-02", dec!(1), dec!(0)),
        corrupt,
        row(user, "2024-04", dec!(1), dec!(0)),
    ])
    .await;

    let err = resume(&store, &LedgerPolicy::default(), user, monthly("2024-01"))
        .await
        .unwrap_err();
    let LedgerError::InvariantViolation(breach) = err else {
        panic!("expected invariant violation");
    };
    assert_eq!(breach.period_key, monthly("2024-03"));
    assert_eq!(breach.field, "balance_bank_amount");

    // Rows before the corrupt one were re-chained, the corrupt one was left alone
    let feb = store.get(user, monthly("2024-02")).await.unwrap().unwrap();
    assert_eq!(feb.previous_cash_amount, dec!(100));
    let march = store.get(user, monthly("2024-03")).await.unwrap().unwrap();
    assert_eq!(march.balance_bank_amount, dec!(42));
}

#[tokio::test]
async fn test_interrupted_cascade_recovers_on_rerun() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-02", dec!(1), dec!(0)),
        row(user, "2024-03", dec!(1), dec!(0)),
    ])
    .await;
    let policy = LedgerPolicy::default();

    store.fail_next(FaultPoint::Save, 1);
    let err = resume(&store, &policy, user, monthly("2024-01")).await.unwrap_err();
    assert!(err.is_retryable());

    let report = resume(&store, &policy, user, monthly("2024-01")).await.unwrap();
    assert_eq!(report.updated, 2);
    let rows = store.list(user, Granularity::Monthly).await.unwrap();
    assert!(audit_chain(&rows).is_empty());
}

#[tokio::test]
async fn test_resume_from_missing_key_uses_nearest_earlier_row() {
    let user = UserId::new();
    let store = store_with(vec![
        row(user, "2024-01", dec!(100), dec!(0)),
        row(user, "2024-05", dec!(1), dec!(0)),
    ])
    .await;

    let report = resume(&store, &LedgerPolicy::default(), user, monthly("2024-03"))
        .await
        .unwrap();
    assert_eq!(report.updated, 1);
    let may = store.get(user, monthly("2024-05")).await.unwrap().unwrap();
    assert_eq!(may.previous_cash_amount, dec!(100));
}

#[tokio::test]
async fn test_other_users_are_untouched() {
    let alice = UserId::new();
    let bob = UserId::new();
    let store = store_with(vec![
        row(alice, "2024-01", dec!(100), dec!(0)),
        row(bob, "2024-02", dec!(1), dec!(0)),
    ])
    .await;

    let report = resume(&store, &LedgerPolicy::default(), alice, monthly("2024-01"))
        .await
        .unwrap();
    assert_eq!(report.visited, 0);
    let bob_row = store.get(bob, monthly("2024-02")).await.unwrap().unwrap();
    assert_eq!(bob_row.previous_cash_amount, dec!(0));
}

#[tokio::test]
async fn test_propagate_uses_given_opening_balance() {
    let user = UserId::new();
    let store = InMemoryBalanceStore::new();
    let key = monthly("2024-02");
    store
        .apply_delta(user, key, &income(dec!(3)), CashBank::ZERO)
        .await
        .unwrap();

    let report = propagate(
        &store,
        &LedgerPolicy::default(),
        user,
        monthly("2024-01"),
        CashBank::new(dec!(10), dec!(20)),
    )
    .await
    .unwrap();
    assert_eq!(report.updated, 1);
    let feb = store.get(user, key).await.unwrap().unwrap();
    assert_eq!(feb.previous(), CashBank::new(dec!(10), dec!(20)));
    assert_eq!(feb.total_balance, dec!(33));
}
