//! Tuning knobs for the ledger engine.

use std::future::Future;
use std::time::Duration;

use moneyflow_shared::{HorizonConfig, LedgerConfig, RetryConfig};
use tracing::warn;

use super::error::LedgerError;
use crate::period::Granularity;

/// Bounds on how far the engine walks and how hard it retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    horizons: HorizonConfig,
    /// Periods searched backward on the read path.
    pub inheritance_lookback: u32,
    /// Rows rewritten by one cascade at most.
    pub max_rows_per_cascade: u64,
    /// Backoff for transient storage failures.
    pub retry: RetryPolicy,
}

impl LedgerPolicy {
    /// Builds the policy from the `ledger` config section.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            horizons: config.horizons,
            inheritance_lookback: config.inheritance_lookback,
            max_rows_per_cascade: config.max_rows_per_cascade.max(1),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    /// Number of periods the cascade walks forward, and the seed search walks
    /// backward, for `granularity`.
    #[must_use]
    pub const fn horizon(&self, granularity: Granularity) -> u32 {
        match granularity {
            Granularity::Daily => self.horizons.daily,
            Granularity::Weekly => self.horizons.weekly,
            Granularity::Monthly => self.horizons.monthly,
            Granularity::Quarterly => self.horizons.quarterly,
            Granularity::Semiannual => self.horizons.semiannual,
            Granularity::Annual => self.horizons.annual,
        }
    }
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Builds the policy from the `ledger.retry` config section.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// A single attempt with no waiting.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `failures + 1`, doubling from `base_delay`.
    #[must_use]
    pub fn delay_after(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or runs
    /// out of attempts.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or `RetriesExhausted` carrying
    /// the last storage error.
    pub async fn run<T, F, Fut>(&self, stage: &'static str, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut failures = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(LedgerError::Store(err)) if err.is_retryable() => {
                    failures += 1;
                    if failures >= self.max_attempts {
                        return Err(LedgerError::RetriesExhausted {
                            stage,
                            attempts: failures,
                            source: err,
                        });
                    }
                    let delay = self.delay_after(failures);
                    warn!(
                        stage,
                        attempt = failures,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying after transient storage error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
