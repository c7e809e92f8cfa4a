//! Calendar periods.
//!
//! Maps a date and a [`Granularity`] to a canonical [`PeriodKey`] and walks
//! between adjacent keys of the same granularity.

mod error;
mod granularity;
mod key;

pub use error::PeriodError;
pub use granularity::Granularity;
pub use key::PeriodKey;
