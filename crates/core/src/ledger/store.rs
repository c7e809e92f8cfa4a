//! Storage seam for period rows.
//!
//! The ledger logic only talks to [`BalanceStore`]. The Postgres repository
//! in `moneyflow-db` and [`InMemoryBalanceStore`](super::InMemoryBalanceStore)
//! both implement it.

use async_trait::async_trait;
use moneyflow_shared::types::UserId;
use thiserror::Error;

use super::balance::{AmountOverflow, InvariantBreach};
use super::types::{CashBank, FlowDelta, PeriodBalance};
use crate::period::{Granularity, PeriodKey};

/// Errors reported by a storage backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Connection loss, timeout, or similar; the call may be replayed.
    #[error("Transient storage failure: {0}")]
    Transient(String),

    /// Lost a race on the same row (lock failure or unique violation).
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A stored row breaks the balance equation.
    #[error("Invariant violation: {0}")]
    Invariant(InvariantBreach),

    /// Applying a delta pushed a row amount out of range.
    #[error("{0}")]
    Overflow(AmountOverflow),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if replaying the call can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Conflict(_))
    }
}

impl From<InvariantBreach> for StoreError {
    fn from(breach: InvariantBreach) -> Self {
        Self::Invariant(breach)
    }
}

impl From<AmountOverflow> for StoreError {
    fn from(overflow: AmountOverflow) -> Self {
        Self::Overflow(overflow)
    }
}

/// Persistent per-`(user, granularity, period)` accumulator store.
///
/// Keys carry their granularity, so each call addresses exactly one of the
/// six granularity tables.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Fetches one row.
    async fn get(&self, user_id: UserId, key: PeriodKey)
    -> Result<Option<PeriodBalance>, StoreError>;

    /// Nearest row with `floor <= k < before`.
    async fn latest_before(
        &self,
        user_id: UserId,
        before: PeriodKey,
        floor: PeriodKey,
    ) -> Result<Option<PeriodBalance>, StoreError>;

    /// Rows with `after < k <= through`, ascending, at most `limit` of them.
    async fn range_after(
        &self,
        user_id: UserId,
        after: PeriodKey,
        through: PeriodKey,
        limit: u64,
    ) -> Result<Vec<PeriodBalance>, StoreError>;

    /// Atomically adds `delta` to the row at `key`, inserting a row that
    /// opens at `seed` when none exists. Implementations delegate the
    /// arithmetic to [`upsert_row`](super::balance::upsert_row) and must
    /// serialize concurrent calls for the same key.
    async fn apply_delta(
        &self,
        user_id: UserId,
        key: PeriodKey,
        delta: &FlowDelta,
        seed: CashBank,
    ) -> Result<PeriodBalance, StoreError>;

    /// Overwrites an existing row.
    async fn save(&self, row: &PeriodBalance) -> Result<(), StoreError>;

    /// Every row of one user and granularity, ascending.
    async fn list(
        &self,
        user_id: UserId,
        granularity: Granularity,
    ) -> Result<Vec<PeriodBalance>, StoreError>;
}
