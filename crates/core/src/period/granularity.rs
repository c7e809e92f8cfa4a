//! The six calendar bucket sizes the ledger tracks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PeriodError;

/// Calendar bucket size of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One calendar day.
    Daily,
    /// One ISO-8601 week (Monday to Sunday).
    Weekly,
    /// One calendar month.
    Monthly,
    /// Three calendar months starting January, April, July, October.
    Quarterly,
    /// Six calendar months starting January or July.
    Semiannual,
    /// One calendar year.
    Annual,
}

impl Granularity {
    /// Every granularity, finest first.
    pub const ALL: [Self; 6] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Semiannual,
        Self::Annual,
    ];

    /// Lowercase name used in URLs, config, and serialized payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Semiannual => "semiannual",
            Self::Annual => "annual",
        }
    }

    /// Approximate number of days in one period.
    ///
    /// This is a fixed lookup used for the overview's daily spending rate,
    /// not the real length of any particular period.
    #[must_use]
    pub const fn period_length_days(self) -> u32 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 90,
            Self::Semiannual => 180,
            Self::Annual => 365,
        }
    }

    /// Months per period for the month-aligned granularities.
    pub(crate) const fn months(self) -> Option<u32> {
        match self {
            Self::Daily | Self::Weekly => None,
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::Semiannual => Some(6),
            Self::Annual => Some(12),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PeriodError::InvalidGranularity(s.to_string()))
    }
}
