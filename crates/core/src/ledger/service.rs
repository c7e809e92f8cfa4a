//! Ledger service: the entry point for mutations and reads.
//!
//! The service owns no data. It is constructed once with a [`BalanceStore`]
//! and a [`LedgerPolicy`] and injected wherever the ledger is needed.
//!
//! A mutation touches six rows, one per granularity. The six updates run
//! concurrently; within one `(user, granularity)` every upsert, cascade and
//! rebuild is serialized by an async mutex so a cascade never interleaves
//! with another write to the same chain.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use moneyflow_shared::types::UserId;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::balance::{InvariantBreach, audit_chain};
use super::error::LedgerError;
use super::mutation::TransactionMutation;
use super::policy::LedgerPolicy;
use super::report::{
    EditReport, GranularityFailure, GranularityOutcome, MutationReport, RebuildReport,
    UpdateStage,
};
use super::store::BalanceStore;
use super::types::{CashBank, FlowDelta, PeriodBalance};
use crate::cascade::{self, CascadeReport};
use crate::inheritance::{self, LedgerRead};
use crate::overview::BudgetOverview;
use crate::period::{Granularity, PeriodKey};

/// Ledger façade over a storage backend.
pub struct LedgerService {
    store: Arc<dyn BalanceStore>,
    policy: LedgerPolicy,
    locks: DashMap<(UserId, Granularity), Arc<Mutex<()>>>,
}

impl LedgerService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn BalanceStore>, policy: LedgerPolicy) -> Self {
        Self {
            store,
            policy,
            locks: DashMap::new(),
        }
    }

    /// Policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Applies one transaction mutation to all six granularities.
    ///
    /// # Errors
    ///
    /// - `Validation` or `Period` before any row is touched
    /// - `Incomplete` if at least one granularity could not be updated; the
    ///   error lists which ones were applied and which must be replayed
    #[instrument(
        skip(self, mutation),
        fields(
            user_id = %mutation.user_id,
            date = %mutation.date,
            kind = ?mutation.kind,
            operation = ?mutation.operation
        )
    )]
    pub async fn record(
        &self,
        mutation: &TransactionMutation,
    ) -> Result<MutationReport, LedgerError> {
        mutation.validate()?;

        let user_id = mutation.user_id;
        let delta = mutation.delta();
        let keys = Granularity::ALL
            .into_iter()
            .map(|granularity| PeriodKey::from_date(granularity, mutation.date))
            .collect::<Result<Vec<_>, _>>()?;

        let results = join_all(keys.into_iter().map(|key| async move {
            (key, self.update_granularity(user_id, key, delta).await)
        }))
        .await;

        let mut applied = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (key, result) in results {
            match result {
                Ok((row, cascade)) => applied.push(GranularityOutcome {
                    granularity: key.granularity(),
                    period_key: key,
                    row,
                    cascade,
                }),
                Err((stage, err)) => {
                    warn!(
                        granularity = %key.granularity(),
                        period_key = %key,
                        stage = stage.as_str(),
                        error = %err,
                        "Granularity update failed"
                    );
                    failed.push(GranularityFailure {
                        granularity: key.granularity(),
                        period_key: key,
                        stage,
                        code: err.error_code(),
                        message: err.to_string(),
                        retryable: err.is_retryable(),
                    });
                }
            }
        }

        if failed.is_empty() {
            Ok(MutationReport {
                user_id,
                date: mutation.date,
                outcomes: applied,
            })
        } else {
            Err(LedgerError::Incomplete { applied, failed })
        }
    }

    /// Replaces `old` with `new`: reverses the old values, then applies the
    /// new ones.
    ///
    /// # Errors
    ///
    /// - `Validation` if the two mutations belong to different users or
    ///   either is invalid; nothing is touched in that case
    /// - Any error from [`record`](Self::record)
    #[instrument(skip(self, old, new), fields(user_id = %old.user_id))]
    pub async fn record_edit(
        &self,
        old: &TransactionMutation,
        new: &TransactionMutation,
    ) -> Result<EditReport, LedgerError> {
        if old.user_id != new.user_id {
            return Err(LedgerError::Validation(
                "an edit cannot move a transaction to another user".to_string(),
            ));
        }
        old.validate()?;
        new.validate()?;

        let reversed = self.record(&old.reversed()).await?;
        let applied = self.record(new).await?;
        Ok(EditReport { reversed, applied })
    }

    /// Adds `delta` to one row and cascades the change forward.
    ///
    /// Every call adds the delta again. To finish a granularity that
    /// [`record`](Self::record) reported as failed, use
    /// [`replay`](Self::replay), which skips the delta when it is already
    /// committed.
    ///
    /// # Errors
    ///
    /// - `InvariantViolation` if the row or a later row is corrupt
    /// - `AmountOverflow` if the delta pushes an amount out of range
    /// - `RetriesExhausted` if storage kept failing
    /// - `Store` on a non-retryable storage failure
    #[instrument(skip(self, delta), fields(granularity = %key.granularity(), period_key = %key))]
    pub async fn upsert_delta(
        &self,
        user_id: UserId,
        key: PeriodKey,
        delta: FlowDelta,
    ) -> Result<(PeriodBalance, CascadeReport), LedgerError> {
        self.update_granularity(user_id, key, delta)
            .await
            .map_err(|(_, err)| err)
    }

    /// Finishes one granularity of `mutation` that [`record`](Self::record)
    /// reported as failed at `stage`.
    ///
    /// An `Upsert` failure never reached the row, so the delta is applied and
    /// cascaded. A `Cascade` failure already committed the delta, so only the
    /// cascade is re-run from the stored row.
    ///
    /// # Errors
    ///
    /// - `Validation` or `Period` if the mutation is invalid, or if a cascade
    ///   replay finds no row to cascade from
    /// - Any error from [`upsert_delta`](Self::upsert_delta) or
    ///   [`cascade`](Self::cascade)
    #[instrument(
        skip(self, mutation),
        fields(user_id = %mutation.user_id, date = %mutation.date, stage = stage.as_str())
    )]
    pub async fn replay(
        &self,
        mutation: &TransactionMutation,
        granularity: Granularity,
        stage: UpdateStage,
    ) -> Result<GranularityOutcome, LedgerError> {
        mutation.validate()?;
        let user_id = mutation.user_id;
        let key = PeriodKey::from_date(granularity, mutation.date)?;

        let (row, cascade) = match stage {
            UpdateStage::Upsert => self.upsert_delta(user_id, key, mutation.delta()).await?,
            UpdateStage::Cascade => {
                let report = self.cascade(user_id, key).await?;
                let row = self.get(user_id, key).await?.ok_or_else(|| {
                    LedgerError::Validation(format!(
                        "no {granularity} row at {key} to cascade from"
                    ))
                })?;
                (row, report)
            }
        };

        info!(
            granularity = %granularity,
            period_key = %key,
            updated = cascade.updated,
            "Granularity replayed"
        );
        Ok(GranularityOutcome {
            granularity,
            period_key: key,
            row,
            cascade,
        })
    }

    /// Upsert then cascade for one granularity, tagging a failure with the
    /// stage it happened in.
    async fn update_granularity(
        &self,
        user_id: UserId,
        key: PeriodKey,
        delta: FlowDelta,
    ) -> Result<(PeriodBalance, CascadeReport), (UpdateStage, LedgerError)> {
        let store = self.store.as_ref();
        let policy = &self.policy;

        self.exclusive(user_id, key.granularity(), async move {
            let row = policy
                .retry
                .run(UpdateStage::Upsert.as_str(), move || async move {
                    let seed = seed_for(store, policy, user_id, key).await?;
                    Ok::<_, LedgerError>(store.apply_delta(user_id, key, &delta, seed).await?)
                })
                .await
                .map_err(|err| (UpdateStage::Upsert, err))?;

            let opening = row.balance();
            let report = policy
                .retry
                .run(UpdateStage::Cascade.as_str(), move || {
                    cascade::propagate(store, policy, user_id, key, opening)
                })
                .await
                .map_err(|err| (UpdateStage::Cascade, err))?;

            Ok::<_, (UpdateStage, LedgerError)>((row, report))
        })
        .await
    }

    /// Re-runs propagation after `key` from whatever is stored.
    ///
    /// # Errors
    ///
    /// Same as the cascade stage of [`upsert_delta`](Self::upsert_delta).
    #[instrument(skip(self), fields(granularity = %key.granularity(), period_key = %key))]
    pub async fn cascade(
        &self,
        user_id: UserId,
        key: PeriodKey,
    ) -> Result<CascadeReport, LedgerError> {
        let store = self.store.as_ref();
        let policy = &self.policy;
        self.exclusive(
            user_id,
            key.granularity(),
            policy.retry.run(UpdateStage::Cascade.as_str(), move || {
                cascade::resume(store, policy, user_id, key)
            }),
        )
        .await
    }

    /// Stored row at `key`, if any.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn get(
        &self,
        user_id: UserId,
        key: PeriodKey,
    ) -> Result<Option<PeriodBalance>, LedgerError> {
        Ok(self.store.get(user_id, key).await?)
    }

    /// Row at `key`, inherited from an earlier period when absent.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn read(&self, user_id: UserId, key: PeriodKey) -> Result<LedgerRead, LedgerError> {
        Ok(inheritance::resolve(
            self.store.as_ref(),
            user_id,
            key,
            self.policy.inheritance_lookback,
        )
        .await?)
    }

    /// Budget overview for `key`. An empty ledger yields all zeros.
    ///
    /// # Errors
    ///
    /// - `AmountOverflow` if the row's totals do not fit in a `Decimal`
    /// - storage errors from the read
    #[instrument(skip(self), fields(granularity = %key.granularity(), period_key = %key))]
    pub async fn overview(
        &self,
        user_id: UserId,
        key: PeriodKey,
    ) -> Result<BudgetOverview, LedgerError> {
        let read = self.read(user_id, key).await?;
        Ok(BudgetOverview::calculate(read.row())?)
    }

    /// Recomputes every row of one user and granularity from scratch, in
    /// ascending order, starting from a zero balance.
    ///
    /// Unlike a cascade this has no horizon and also rewrites derived fields
    /// that break the balance equation, so it is the repair path for rows a
    /// cascade could not reach.
    ///
    /// # Errors
    ///
    /// - `RetriesExhausted` if storage kept failing
    /// - `Store` on a non-retryable storage failure
    #[instrument(skip(self))]
    pub async fn rebuild(
        &self,
        user_id: UserId,
        granularity: Granularity,
    ) -> Result<RebuildReport, LedgerError> {
        let store = self.store.as_ref();
        let report = self
            .exclusive(
                user_id,
                granularity,
                self.policy
                    .retry
                    .run("rebuild", move || rebuild_chain(store, user_id, granularity)),
            )
            .await?;

        info!(rows = report.rows, updated = report.updated, "Rebuild finished");
        Ok(report)
    }

    /// Every invariant breach across one user's rows of `granularity`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn audit(
        &self,
        user_id: UserId,
        granularity: Granularity,
    ) -> Result<Vec<InvariantBreach>, LedgerError> {
        let rows = self.store.list(user_id, granularity).await?;
        Ok(audit_chain(&rows))
    }

    /// Runs `work` holding the `(user, granularity)` chain lock.
    ///
    /// The map entry is dropped again once no other task holds or waits on
    /// it, so the map only grows with the chains currently in use.
    async fn exclusive<T>(
        &self,
        user_id: UserId,
        granularity: Granularity,
        work: impl Future<Output = T>,
    ) -> T {
        let slot = (user_id, granularity);
        let lock = self.locks.entry(slot).or_default().value().clone();
        let result = {
            let _guard = lock.lock().await;
            work.await
        };
        drop(lock);
        // Clones are only handed out under the shard lock `remove_if` holds
        self.locks.remove_if(&slot, |_, held| Arc::strong_count(held) == 1);
        result
    }
}

/// Opening balance for a row created at `key`: the closing balance of the
/// nearest earlier row within the horizon, else zero.
async fn seed_for(
    store: &dyn BalanceStore,
    policy: &LedgerPolicy,
    user_id: UserId,
    key: PeriodKey,
) -> Result<CashBank, LedgerError> {
    let horizon = i64::from(policy.horizon(key.granularity()));
    let ancestor = store
        .latest_before(user_id, key, key.saturating_shift(-horizon))
        .await?;
    Ok(ancestor.map_or(CashBank::ZERO, |row| row.balance()))
}

async fn rebuild_chain(
    store: &dyn BalanceStore,
    user_id: UserId,
    granularity: Granularity,
) -> Result<RebuildReport, LedgerError> {
    let rows = store.list(user_id, granularity).await?;
    let mut report = RebuildReport {
        user_id,
        granularity,
        rows: rows.len() as u64,
        updated: 0,
    };

    let mut prior = CashBank::ZERO;
    for stored in rows {
        let mut row = stored.clone();
        row.set_previous(prior)?;
        if !row.same_amounts(&stored) {
            for breach in stored.breaches() {
                warn!(%breach, "Rebuild is repairing a row");
            }
            row.updated_at = chrono::Utc::now();
            store.save(&row).await?;
            report.updated += 1;
        }
        prior = row.balance();
    }
    Ok(report)
}
