//! In-process [`BalanceStore`] backed by a `BTreeMap`.
//!
//! Used by the service tests and by any caller that does not need
//! persistence. Writes can be made to fail on demand to exercise the retry
//! paths.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use moneyflow_shared::types::UserId;
use tokio::sync::RwLock;

use super::balance::upsert_row;
use super::store::{BalanceStore, StoreError};
use super::types::{CashBank, FlowDelta, PeriodBalance};
use crate::period::{Granularity, PeriodKey};

/// Write operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// [`BalanceStore::apply_delta`].
    ApplyDelta,
    /// [`BalanceStore::save`].
    Save,
}

/// Thread-safe in-memory row store.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    rows: RwLock<BTreeMap<(UserId, PeriodKey), PeriodBalance>>,
    apply_faults: AtomicU32,
    save_faults: AtomicU32,
}

impl InMemoryBalanceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` calls at `point` fail with a transient error
    /// without writing anything.
    pub fn fail_next(&self, point: FaultPoint, times: u32) {
        self.counter(point).store(times, Ordering::SeqCst);
    }

    /// Stores a row as-is, bypassing all checks.
    pub async fn insert_raw(&self, row: PeriodBalance) {
        self.rows
            .write()
            .await
            .insert((row.user_id, row.period_key), row);
    }

    /// Total number of rows across all users and granularities.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns true if no row has been written.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn counter(&self, point: FaultPoint) -> &AtomicU32 {
        match point {
            FaultPoint::ApplyDelta => &self.apply_faults,
            FaultPoint::Save => &self.save_faults,
        }
    }

    fn injected_fault(&self, point: FaultPoint) -> Result<(), StoreError> {
        let hit = self
            .counter(point)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            Err(StoreError::Transient(format!("injected {point:?} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn get(
        &self,
        user_id: UserId,
        key: PeriodKey,
    ) -> Result<Option<PeriodBalance>, StoreError> {
        Ok(self.rows.read().await.get(&(user_id, key)).cloned())
    }

    async fn latest_before(
        &self,
        user_id: UserId,
        before: PeriodKey,
        floor: PeriodKey,
    ) -> Result<Option<PeriodBalance>, StoreError> {
        if floor >= before {
            return Ok(None);
        }
        let rows = self.rows.read().await;
        Ok(rows
            .range((
                Bound::Included((user_id, floor)),
                Bound::Excluded((user_id, before)),
            ))
            .next_back()
            .map(|(_, row)| row.clone()))
    }

    async fn range_after(
        &self,
        user_id: UserId,
        after: PeriodKey,
        through: PeriodKey,
        limit: u64,
    ) -> Result<Vec<PeriodBalance>, StoreError> {
        if through <= after {
            return Ok(Vec::new());
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let rows = self.rows.read().await;
        Ok(rows
            .range((
                Bound::Excluded((user_id, after)),
                Bound::Included((user_id, through)),
            ))
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn apply_delta(
        &self,
        user_id: UserId,
        key: PeriodKey,
        delta: &FlowDelta,
        seed: CashBank,
    ) -> Result<PeriodBalance, StoreError> {
        self.injected_fault(FaultPoint::ApplyDelta)?;
        let mut rows = self.rows.write().await;
        let existing = rows.get(&(user_id, key)).cloned();
        let row = upsert_row(existing, user_id, key, delta, seed)?;
        rows.insert((user_id, key), row.clone());
        Ok(row)
    }

    async fn save(&self, row: &PeriodBalance) -> Result<(), StoreError> {
        self.injected_fault(FaultPoint::Save)?;
        let mut rows = self.rows.write().await;
        match rows.get_mut(&(row.user_id, row.period_key)) {
            Some(slot) => {
                *slot = row.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "no {} row {} to update",
                row.granularity(),
                row.period_key
            ))),
        }
    }

    async fn list(
        &self,
        user_id: UserId,
        granularity: Granularity,
    ) -> Result<Vec<PeriodBalance>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .range((
                Bound::Included((user_id, PeriodKey::first(granularity))),
                Bound::Included((user_id, PeriodKey::last(granularity))),
            ))
            .map(|(_, row)| row.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn monthly(text: &str) -> PeriodKey {
        PeriodKey::parse(Granularity::Monthly, text).unwrap()
    }

    fn income(amount: rust_decimal::Decimal) -> FlowDelta {
        FlowDelta {
            income: CashBank::new(amount, dec!(0)),
            ..FlowDelta::default()
        }
    }

    #[tokio::test]
    async fn test_queries_are_scoped_to_user_and_granularity() {
        let store = InMemoryBalanceStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        for text in ["2024-01", "2024-03", "2024-07"] {
            store
                .apply_delta(alice, monthly(text), &income(dec!(1)), CashBank::ZERO)
                .await
                .unwrap();
        }
        store
            .apply_delta(bob, monthly("2024-02"), &income(dec!(1)), CashBank::ZERO)
            .await
            .unwrap();
        let daily = PeriodKey::parse(Granularity::Daily, "2024-02-10").unwrap();
        store
            .apply_delta(alice, daily, &income(dec!(1)), CashBank::ZERO)
            .await
            .unwrap();

        let listed = store.list(alice, Granularity::Monthly).await.unwrap();
        let keys: Vec<String> = listed.iter().map(|r| r.period_key.to_string()).collect();
        assert_eq!(keys, vec!["2024-01", "2024-03", "2024-07"]);

        let before = store
            .latest_before(alice, monthly("2024-06"), monthly("2023-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.period_key, monthly("2024-03"));

        // floor is inclusive, before is exclusive
        assert!(
            store
                .latest_before(alice, monthly("2024-03"), monthly("2024-02"))
                .await
                .unwrap()
                .is_none()
        );

        let after = store
            .range_after(alice, monthly("2024-01"), monthly("2024-07"), 10)
            .await
            .unwrap();
        assert_eq!(after.len(), 2);
        let capped = store
            .range_after(alice, monthly("2024-01"), monthly("2024-07"), 1)
            .await
            .unwrap();
        assert_eq!(capped[0].period_key, monthly("2024-03"));
        assert_eq!(capped.len(), 1);

        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn test_injected_faults_are_consumed() {
        let store = InMemoryBalanceStore::new();
        let user = UserId::new();
        store.fail_next(FaultPoint::ApplyDelta, 2);

        for _ in 0..2 {
            let err = store
                .apply_delta(user, monthly("2024-01"), &income(dec!(5)), CashBank::ZERO)
                .await
                .unwrap_err();
            assert!(err.is_retryable());
        }
        assert!(store.is_empty().await);

        let row = store
            .apply_delta(user, monthly("2024-01"), &income(dec!(5)), CashBank::ZERO)
            .await
            .unwrap();
        assert_eq!(row.balance_cash_amount, dec!(5));
    }

    #[tokio::test]
    async fn test_save_requires_existing_row() {
        let store = InMemoryBalanceStore::new();
        let row = PeriodBalance::empty(UserId::new(), monthly("2024-01"));
        assert!(matches!(
            store.save(&row).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_delta_refuses_corrupt_row() {
        let store = InMemoryBalanceStore::new();
        let user = UserId::new();
        let mut row = PeriodBalance::empty(user, monthly("2024-01"));
        row.total_balance = dec!(99);
        store.insert_raw(row).await;

        let err = store
            .apply_delta(user, monthly("2024-01"), &income(dec!(1)), CashBank::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
        let stored = store.get(user, monthly("2024-01")).await.unwrap().unwrap();
        assert_eq!(stored.income_cash_amount, dec!(0));
    }
}
