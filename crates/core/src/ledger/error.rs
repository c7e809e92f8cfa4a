//! Ledger error types.
//!
//! Errors are grouped by how a caller should react: validation errors are
//! rejected before any row is touched, invariant violations are fatal,
//! storage errors may be retried, and `Incomplete` tells the caller exactly
//! which granularities still need a replay.

use moneyflow_shared::AppError;
use thiserror::Error;

use super::balance::{AmountOverflow, InvariantBreach};
use super::report::{GranularityFailure, GranularityOutcome};
use super::store::StoreError;
use crate::period::PeriodError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// The mutation was rejected before touching storage.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad granularity, period key, or date.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// The mutation would push a row amount out of the representable range.
    #[error(transparent)]
    AmountOverflow(#[from] AmountOverflow),

    // ========== Integrity Errors ==========
    /// A row fails the balance equation; never auto-corrected.
    #[error("Invariant violation: {0}")]
    InvariantViolation(InvariantBreach),

    // ========== Storage Errors ==========
    /// A storage call failed.
    #[error(transparent)]
    Store(StoreError),

    /// A retryable storage error persisted through every attempt.
    #[error("{stage} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// `upsert` or `cascade`.
        stage: &'static str,
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        source: StoreError,
    },

    // ========== Partial Application ==========
    /// Some granularities were updated and some were not.
    #[error(
        "Ledger update incomplete: {} granularities applied, {} failed",
        .applied.len(),
        .failed.len()
    )]
    Incomplete {
        /// Granularities that were fully updated.
        applied: Vec<GranularityOutcome>,
        /// Granularities that must be replayed.
        failed: Vec<GranularityFailure>,
    },
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invariant(breach) => Self::InvariantViolation(breach),
            StoreError::Overflow(overflow) => Self::AmountOverflow(overflow),
            other => Self::Store(other),
        }
    }
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Period(_) => "INVALID_PERIOD",
            Self::AmountOverflow(_) => "AMOUNT_OVERFLOW",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Store(StoreError::Transient(_)) => "STORAGE_UNAVAILABLE",
            Self::Store(StoreError::Conflict(_)) => "CONCURRENT_MODIFICATION",
            Self::Store(_) => "STORAGE_ERROR",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Self::Incomplete { .. } => "LEDGER_UPDATE_INCOMPLETE",
        }
    }

    /// Returns the HTTP status code this error maps to.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Period(_) | Self::AmountOverflow(_) => 400,
            Self::Store(StoreError::Conflict(_)) => 409,
            Self::Store(StoreError::Transient(_))
            | Self::RetriesExhausted { .. }
            | Self::Incomplete { .. } => 503,
            Self::InvariantViolation(_) | Self::Store(_) => 500,
        }
    }

    /// Returns true if replaying the same operation can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::RetriesExhausted { .. } => true,
            Self::Incomplete { failed, .. } => failed.iter().all(|f| f.retryable),
            Self::Validation(_)
            | Self::Period(_)
            | Self::AmountOverflow(_)
            | Self::InvariantViolation(_) => false,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::Validation(_)
            | LedgerError::Period(_)
            | LedgerError::AmountOverflow(_) => Self::Validation(message),
            LedgerError::InvariantViolation(_) => Self::Internal(message),
            LedgerError::Store(StoreError::Transient(_))
            | LedgerError::RetriesExhausted { .. }
            | LedgerError::Incomplete { .. } => Self::Unavailable(message),
            LedgerError::Store(StoreError::Conflict(_)) => Self::Conflict(message),
            LedgerError::Store(_) => Self::Database(message),
        }
    }
}
