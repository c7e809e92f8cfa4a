//! Canonical period keys.
//!
//! A key is stored as the granularity plus the first day of the period, so
//! keys of one granularity order chronologically. The canonical string forms
//! are:
//!
//! | Granularity | Format       | Example      |
//! |-------------|--------------|--------------|
//! | daily       | `YYYY-MM-DD` | `2024-03-15` |
//! | weekly      | `YYYY-WW`    | `2024-11`    |
//! | monthly     | `YYYY-MM`    | `2024-03`    |
//! | quarterly   | `YYYY-Qn`    | `2024-Q1`    |
//! | semiannual  | `YYYY-Hn`    | `2024-H1`    |
//! | annual      | `YYYY`       | `2024`       |
//!
//! Weekly keys use the ISO-8601 week-numbering year, so `2024-12-30` belongs
//! to `2025-01`. Years are limited to 1..=9999, which keeps the canonical
//! strings lexicographically sorted in date order.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, TimeDelta, Weekday};
use serde::{Serialize, Serializer};

use super::{Granularity, PeriodError};

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Identifies one period of one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    granularity: Granularity,
    start: NaiveDate,
}

impl PeriodKey {
    /// Returns the key of the period containing `date`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if the period's year is outside 1..=9999.
    pub fn from_date(granularity: Granularity, date: NaiveDate) -> Result<Self, PeriodError> {
        let start = match granularity {
            Granularity::Daily => date,
            Granularity::Weekly => {
                let week = date.iso_week();
                NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon)
                    .ok_or(PeriodError::OutOfRange)?
            }
            Granularity::Monthly
            | Granularity::Quarterly
            | Granularity::Semiannual
            | Granularity::Annual => {
                let months = granularity.months().unwrap_or(1);
                let month0 = date.month0() / months * months;
                month_start(i64::from(date.year()) * 12 + i64::from(month0))?
            }
        };
        Self::checked(granularity, start)
    }

    /// Parses a canonical key string.
    ///
    /// Only the exact canonical form is accepted: `2024-3` is rejected as a
    /// monthly key, `2024-W11` as a weekly key.
    ///
    /// # Errors
    ///
    /// - `InvalidPeriodKey` if the text is not in canonical form
    /// - `InvalidDate` if the fields are well formed but name no real period
    /// - `OutOfRange` for years outside 1..=9999
    pub fn parse(granularity: Granularity, text: &str) -> Result<Self, PeriodError> {
        let invalid_key = || PeriodError::InvalidPeriodKey {
            granularity,
            value: text.to_string(),
        };
        let invalid_date = || PeriodError::InvalidDate {
            granularity,
            value: text.to_string(),
        };

        let (year, rest) = text.split_once('-').unwrap_or((text, ""));
        let year = number::<i32>(year).ok_or_else(invalid_key)?;
        let start = match granularity {
            Granularity::Daily => {
                let (month, day) = rest.split_once('-').ok_or_else(invalid_key)?;
                let month = number(month).ok_or_else(invalid_key)?;
                let day = number(day).ok_or_else(invalid_key)?;
                NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid_date)?
            }
            Granularity::Weekly => {
                let week = number(rest).ok_or_else(invalid_key)?;
                NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid_date)?
            }
            Granularity::Monthly => {
                let month = number(rest).ok_or_else(invalid_key)?;
                NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid_date)?
            }
            Granularity::Quarterly | Granularity::Semiannual => {
                let (prefix, count) = if granularity == Granularity::Quarterly {
                    ('Q', 4)
                } else {
                    ('H', 2)
                };
                let index = rest
                    .strip_prefix(prefix)
                    .and_then(number::<u32>)
                    .ok_or_else(invalid_key)?;
                if !(1..=count).contains(&index) {
                    return Err(invalid_date());
                }
                let month = (index - 1) * (12 / count) + 1;
                NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid_date)?
            }
            Granularity::Annual => NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid_date)?,
        };

        let key = Self::checked(granularity, start)?;
        if key.to_string() == text {
            Ok(key)
        } else {
            Err(invalid_key())
        }
    }

    /// Earliest representable key of a granularity.
    #[must_use]
    pub fn first(granularity: Granularity) -> Self {
        Self {
            granularity,
            start: NaiveDate::from_ymd_opt(MIN_YEAR, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }

    /// Latest representable key of a granularity.
    #[must_use]
    pub fn last(granularity: Granularity) -> Self {
        let end = NaiveDate::from_ymd_opt(MAX_YEAR, 12, 31).unwrap_or(NaiveDate::MAX);
        Self::from_date(granularity, end).unwrap_or(Self {
            granularity,
            start: end,
        })
    }

    /// Granularity of this key.
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// First day of the period.
    #[must_use]
    pub const fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the period.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        let end = match self.granularity.months() {
            None if self.granularity == Granularity::Weekly => {
                self.start.checked_add_days(Days::new(6))
            }
            None => Some(self.start),
            Some(months) => month_start(self.month_index() + i64::from(months))
                .ok()
                .and_then(|next| next.pred_opt()),
        };
        // Only reachable past the last day chrono can represent.
        end.unwrap_or(NaiveDate::MAX)
    }

    /// Returns true if `date` falls inside this period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end_date()
    }

    /// The immediately following period.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` past year 9999.
    pub fn next(&self) -> Result<Self, PeriodError> {
        self.shift(1)
    }

    /// The immediately preceding period.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` before year 1.
    pub fn prev(&self) -> Result<Self, PeriodError> {
        self.shift(-1)
    }

    /// Moves the key by `steps` periods (negative moves backward).
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if the result leaves years 1..=9999.
    pub fn shift(&self, steps: i64) -> Result<Self, PeriodError> {
        let start = match self.granularity.months() {
            Some(months) => {
                let index = steps
                    .checked_mul(i64::from(months))
                    .and_then(|delta| self.month_index().checked_add(delta))
                    .ok_or(PeriodError::OutOfRange)?;
                month_start(index)?
            }
            None => {
                let days = if self.granularity == Granularity::Weekly {
                    steps.checked_mul(7).ok_or(PeriodError::OutOfRange)?
                } else {
                    steps
                };
                TimeDelta::try_days(days)
                    .and_then(|delta| self.start.checked_add_signed(delta))
                    .ok_or(PeriodError::OutOfRange)?
            }
        };
        Self::checked(self.granularity, start)
    }

    /// Like [`shift`](Self::shift) but clamps to the first or last
    /// representable key instead of failing.
    #[must_use]
    pub fn saturating_shift(&self, steps: i64) -> Self {
        self.shift(steps).unwrap_or_else(|_| {
            if steps < 0 {
                Self::first(self.granularity)
            } else {
                Self::last(self.granularity)
            }
        })
    }

    fn checked(granularity: Granularity, start: NaiveDate) -> Result<Self, PeriodError> {
        let year = if granularity == Granularity::Weekly {
            start.iso_week().year()
        } else {
            start.year()
        };
        if (MIN_YEAR..=MAX_YEAR).contains(&year) {
            Ok(Self { granularity, start })
        } else {
            Err(PeriodError::OutOfRange)
        }
    }

    fn month_index(&self) -> i64 {
        i64::from(self.start.year()) * 12 + i64::from(self.start.month0())
    }
}

/// First day of the month with absolute index `year * 12 + month0`.
fn month_start(index: i64) -> Result<NaiveDate, PeriodError> {
    let year = i32::try_from(index.div_euclid(12)).map_err(|_| PeriodError::OutOfRange)?;
    let month0 = u32::try_from(index.rem_euclid(12)).map_err(|_| PeriodError::OutOfRange)?;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).ok_or(PeriodError::OutOfRange)
}

/// Parses an unsigned run of ASCII digits.
fn number<T: FromStr>(text: &str) -> Option<T> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year = self.start.year();
        let month = self.start.month();
        match self.granularity {
            Granularity::Daily => write!(f, "{year:04}-{month:02}-{:02}", self.start.day()),
            Granularity::Weekly => {
                let week = self.start.iso_week();
                write!(f, "{:04}-{:02}", week.year(), week.week())
            }
            Granularity::Monthly => write!(f, "{year:04}-{month:02}"),
            Granularity::Quarterly => write!(f, "{year:04}-Q{}", (month - 1) / 3 + 1),
            Granularity::Semiannual => write!(f, "{year:04}-H{}", (month - 1) / 6 + 1),
            Granularity::Annual => write!(f, "{year:04}"),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
