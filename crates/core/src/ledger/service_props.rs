//! Property-based tests for `LedgerService`.
//!
//! - Every row satisfies the balance equation after any mutation sequence
//! - Every chain links each row to the closing balance of the row before it
//! - The closing balance of the last period equals the net of all mutations
//! - Applying then reversing a mutation restores every balance

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use moneyflow_shared::types::UserId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::mutation::{MutationOp, PaymentMethod, TransactionKind, TransactionMutation};
use super::service::LedgerService;
use super::{InMemoryBalanceStore, LedgerPolicy, RetryPolicy};
use crate::period::{Granularity, PeriodKey};

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn payment_method() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![Just(PaymentMethod::Cash), Just(PaymentMethod::Bank)]
}

fn kind() -> impl Strategy<Value = TransactionKind> {
    prop_oneof![
        Just(TransactionKind::Income),
        Just(TransactionKind::Expense),
        Just(TransactionKind::Bill),
    ]
}

fn operation() -> impl Strategy<Value = MutationOp> {
    prop_oneof![3 => Just(MutationOp::Apply), 1 => Just(MutationOp::Reverse)]
}

/// Dates within 300 days of 2024-01-01, inside every default horizon.
fn day_offset() -> impl Strategy<Value = u64> {
    0u64..300
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

type RawMutation = (u64, Decimal, PaymentMethod, TransactionKind, MutationOp);

fn mutation_strategy() -> impl Strategy<Value = RawMutation> {
    (
        day_offset(),
        positive_amount(),
        payment_method(),
        kind(),
        operation(),
    )
}

fn build(
    user_id: UserId,
    (offset, amount, payment_method, kind, operation): RawMutation,
) -> TransactionMutation {
    TransactionMutation {
        user_id,
        date: base_date() + Days::new(offset),
        amount,
        payment_method,
        kind,
        operation,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn service() -> LedgerService {
    let mut policy = LedgerPolicy::default();
    policy.retry = RetryPolicy::none();
    // Reads reach back as far as the generated dates span
    policy.inheritance_lookback = 400;
    LedgerService::new(Arc::new(InMemoryBalanceStore::new()), policy)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any sequence of mutations leaves every chain consistent.
    #[test]
    fn prop_chains_hold_after_any_sequence(
        raw in prop::collection::vec(mutation_strategy(), 1..20)
    ) {
        let user = UserId::new();
        let mutations: Vec<_> = raw.into_iter().map(|m| build(user, m)).collect();

        runtime().block_on(async {
            let service = service();
            for m in &mutations {
                service.record(m).await.unwrap();
            }

            for granularity in Granularity::ALL {
                let breaches = service.audit(user, granularity).await.unwrap();
                prop_assert!(breaches.is_empty(), "{}: {:?}", granularity, breaches);
            }

            let expected: Decimal = mutations.iter().map(|m| m.delta().net().total()).sum();
            let year = service
                .read(user, PeriodKey::parse(Granularity::Annual, "2024").unwrap())
                .await
                .unwrap();
            prop_assert_eq!(year.row().total_balance, expected);

            let last_day = base_date() + Days::new(299);
            let tail = service
                .read(user, PeriodKey::from_date(Granularity::Daily, last_day).unwrap())
                .await
                .unwrap();
            prop_assert_eq!(tail.row().total_balance, expected);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Reversing a mutation restores every balance it touched.
    #[test]
    fn prop_reverse_restores_balances(
        history in prop::collection::vec(mutation_strategy(), 0..8),
        extra in mutation_strategy(),
    ) {
        let user = UserId::new();
        let history: Vec<_> = history.into_iter().map(|m| build(user, m)).collect();
        let extra = build(user, extra);

        runtime().block_on(async {
            let service = service();
            for m in &history {
                service.record(m).await.unwrap();
            }

            let mut before = Vec::new();
            for granularity in Granularity::ALL {
                let key = PeriodKey::from_date(granularity, extra.date).unwrap();
                before.push(service.read(user, key).await.unwrap().into_row().balance());
            }

            service.record(&extra).await.unwrap();
            service.record(&extra.reversed()).await.unwrap();

            for (granularity, expected) in Granularity::ALL.into_iter().zip(before) {
                let key = PeriodKey::from_date(granularity, extra.date).unwrap();
                let row = service.read(user, key).await.unwrap().into_row();
                prop_assert_eq!(row.balance(), expected);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
