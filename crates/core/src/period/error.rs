//! Period derivation errors.

use thiserror::Error;

use super::Granularity;

/// Errors raised while deriving, parsing, or shifting period keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    /// The granularity name is not one of the six supported buckets.
    #[error("Invalid granularity: {0:?}")]
    InvalidGranularity(String),

    /// The text has the right shape but names a date that does not exist.
    #[error("Invalid date for {granularity} period: {value:?}")]
    InvalidDate {
        /// Granularity being parsed.
        granularity: Granularity,
        /// Offending input.
        value: String,
    },

    /// The text is not a canonical key for the granularity.
    #[error("Invalid {granularity} period key: {value:?}")]
    InvalidPeriodKey {
        /// Granularity being parsed.
        granularity: Granularity,
        /// Offending input.
        value: String,
    },

    /// The period falls outside years 1..=9999.
    #[error("Period out of supported range (years 1-9999)")]
    OutOfRange,
}
