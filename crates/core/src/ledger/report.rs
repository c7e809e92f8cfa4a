//! Outcome types returned by [`LedgerService`](super::LedgerService).

use chrono::NaiveDate;
use moneyflow_shared::types::UserId;
use serde::{Deserialize, Serialize};

use super::types::PeriodBalance;
use crate::cascade::CascadeReport;
use crate::period::{Granularity, PeriodKey};

/// One granularity that was updated and cascaded.
#[derive(Debug, Clone, Serialize)]
pub struct GranularityOutcome {
    /// Granularity updated.
    pub granularity: Granularity,
    /// Period the mutation landed in.
    pub period_key: PeriodKey,
    /// Row after the upsert.
    pub row: PeriodBalance,
    /// Forward propagation summary.
    pub cascade: CascadeReport,
}

/// Step of a granularity update that failed, which decides how it is
/// replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStage {
    /// The delta never reached the row. Replay re-applies the delta.
    Upsert,
    /// The delta is committed but later rows may still open at a stale
    /// balance. Replay only re-runs the cascade.
    Cascade,
}

impl UpdateStage {
    /// Stage name as used in logs and retry errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Cascade => "cascade",
        }
    }
}

/// One granularity that could not be updated.
#[derive(Debug, Clone, Serialize)]
pub struct GranularityFailure {
    /// Granularity that failed.
    pub granularity: Granularity,
    /// Period the mutation targeted.
    pub period_key: PeriodKey,
    /// Where the update stopped.
    pub stage: UpdateStage,
    /// Machine-readable error code.
    pub code: &'static str,
    /// Human-readable error.
    pub message: String,
    /// Whether replaying this granularity can succeed.
    pub retryable: bool,
}

/// Result of applying one mutation across all granularities.
#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    /// Owner of the mutated rows.
    pub user_id: UserId,
    /// Transaction date.
    pub date: NaiveDate,
    /// One entry per granularity, finest first.
    pub outcomes: Vec<GranularityOutcome>,
}

impl MutationReport {
    /// Outcome for one granularity.
    #[must_use]
    pub fn outcome(&self, granularity: Granularity) -> Option<&GranularityOutcome> {
        self.outcomes.iter().find(|o| o.granularity == granularity)
    }
}

/// Result of an edit: the reversal of the old values, then the new values.
#[derive(Debug, Clone, Serialize)]
pub struct EditReport {
    /// Reversal of the old transaction.
    pub reversed: MutationReport,
    /// Application of the new transaction.
    pub applied: MutationReport,
}

/// Result of recomputing one user's rows from scratch.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    /// Owner of the rows.
    pub user_id: UserId,
    /// Granularity rebuilt.
    pub granularity: Granularity,
    /// Rows examined.
    pub rows: u64,
    /// Rows rewritten.
    pub updated: u64,
}
