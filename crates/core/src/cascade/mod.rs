//! Forward propagation of balance corrections.
//!
//! After a row changes, every later row of the same user and granularity
//! opens at a balance that may now be stale. The propagator walks those rows
//! in ascending order, re-chains `previous_*` to the closing balance of the
//! row before it, and rewrites only the rows whose values changed.
//!
//! Gaps are never filled: a period without a row is skipped and the next
//! existing row chains directly to the last visited one. Empty periods are
//! served on read by [`crate::inheritance`].
//!
//! The walk is bounded twice, by the granularity's horizon (counted in
//! periods from the mutated key) and by `max_rows_per_cascade`. Re-running it
//! with no new mutation is a no-op, so an interrupted cascade is recovered by
//! running it again from the same key.

use chrono::Utc;
use moneyflow_shared::types::UserId;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::ledger::{BalanceStore, CashBank, LedgerError, LedgerPolicy};
use crate::period::{Granularity, PeriodKey};

/// Summary of one cascade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Granularity walked.
    pub granularity: Granularity,
    /// Key the walk started after.
    pub start: PeriodKey,
    /// Last key inside the horizon. Later rows are left for a rebuild.
    pub through: PeriodKey,
    /// Existing rows examined.
    pub visited: u64,
    /// Rows rewritten.
    pub updated: u64,
    /// True if the row cap stopped the walk before the horizon.
    pub truncated: bool,
}

/// Re-chains every existing row after `start`, where `opening` is the
/// closing balance the first later row must open at.
///
/// # Errors
///
/// - `InvariantViolation` if a visited row fails the balance equation; rows
///   before it have already been rewritten and are individually correct
/// - `Store` on any storage failure; re-run to recover
pub async fn propagate(
    store: &dyn BalanceStore,
    policy: &LedgerPolicy,
    user_id: UserId,
    start: PeriodKey,
    opening: CashBank,
) -> Result<CascadeReport, LedgerError> {
    let granularity = start.granularity();
    let through = start.saturating_shift(i64::from(policy.horizon(granularity)));
    let cap = policy.max_rows_per_cascade;

    let rows = store
        .range_after(user_id, start, through, cap.saturating_add(1))
        .await?;
    let truncated = rows.len() as u64 > cap;

    let mut report = CascadeReport {
        granularity,
        start,
        through,
        visited: 0,
        updated: 0,
        truncated,
    };

    let mut prior = opening;
    for mut row in rows.into_iter().take(usize::try_from(cap).unwrap_or(usize::MAX)) {
        if let Err(breach) = row.verify() {
            error!(
                user_id = %user_id,
                granularity = %granularity,
                period_key = %row.period_key,
                %breach,
                "Ledger row fails the balance equation; cascade stopped"
            );
            return Err(LedgerError::InvariantViolation(breach));
        }
        report.visited += 1;

        if row.previous() != prior {
            debug!(
                period_key = %row.period_key,
                old_previous = ?row.previous(),
                new_previous = ?prior,
                "Re-chaining row"
            );
            row.set_previous(prior)?;
            row.updated_at = Utc::now();
            store.save(&row).await?;
            report.updated += 1;
        }
        prior = row.balance();
    }

    if truncated {
        warn!(
            user_id = %user_id,
            granularity = %granularity,
            start = %start,
            cap,
            "Cascade hit the row cap; later rows may be stale until rebuilt"
        );
    }
    debug!(
        granularity = %granularity,
        start = %start,
        visited = report.visited,
        updated = report.updated,
        "Cascade finished"
    );
    Ok(report)
}

/// Re-runs propagation from `start` using whatever is stored there: the
/// row's own balance if it exists, else the nearest earlier row's balance
/// within the horizon, else zero.
///
/// # Errors
///
/// Same as [`propagate`].
pub async fn resume(
    store: &dyn BalanceStore,
    policy: &LedgerPolicy,
    user_id: UserId,
    start: PeriodKey,
) -> Result<CascadeReport, LedgerError> {
    let opening = match store.get(user_id, start).await? {
        Some(row) => row.balance(),
        None => {
            let horizon = i64::from(policy.horizon(start.granularity()));
            store
                .latest_before(user_id, start, start.saturating_shift(-horizon))
                .await?
                .map_or(CashBank::ZERO, |row| row.balance())
        }
    };
    propagate(store, policy, user_id, start, opening).await
}

#[cfg(test)]
mod tests;
