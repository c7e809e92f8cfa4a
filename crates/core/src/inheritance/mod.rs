//! Read-side resolution of periods that have no row.
//!
//! Periods nobody has mutated yet (future periods, or quiet ones in between)
//! have no row. Their opening and closing balance is simply the closing
//! balance of the nearest earlier row, with no activity of their own. This
//! never writes anything.

use moneyflow_shared::types::UserId;
use serde::Serialize;

use crate::ledger::{BalanceStore, PeriodBalance, StoreError};
use crate::period::PeriodKey;

/// What a ledger read found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LedgerRead {
    /// The requested period has a row.
    Present {
        /// Stored row.
        row: PeriodBalance,
    },
    /// No row; the balance is carried from an earlier period.
    Inherited {
        /// Period the balance was carried from.
        from: PeriodKey,
        /// Synthesized row for the requested period, zero flows.
        row: PeriodBalance,
    },
    /// No row and no ancestor within the lookback.
    Empty {
        /// All-zero row for the requested period.
        row: PeriodBalance,
    },
}

impl LedgerRead {
    /// The row, stored or synthesized.
    #[must_use]
    pub const fn row(&self) -> &PeriodBalance {
        match self {
            Self::Present { row } | Self::Inherited { row, .. } | Self::Empty { row } => row,
        }
    }

    /// Consumes the read and returns its row.
    #[must_use]
    pub fn into_row(self) -> PeriodBalance {
        match self {
            Self::Present { row } | Self::Inherited { row, .. } | Self::Empty { row } => row,
        }
    }

    /// Returns true if the row exists in storage.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

/// Reads `key`, falling back to the nearest earlier row at most `lookback`
/// periods back.
///
/// # Errors
///
/// Propagates storage errors, and `Overflow` if the ancestor's balance has no
/// representable total.
pub async fn resolve(
    store: &dyn BalanceStore,
    user_id: UserId,
    key: PeriodKey,
    lookback: u32,
) -> Result<LedgerRead, StoreError> {
    if let Some(row) = store.get(user_id, key).await? {
        return Ok(LedgerRead::Present { row });
    }

    let floor = key.saturating_shift(-i64::from(lookback));
    let read = match store.latest_before(user_id, key, floor).await? {
        Some(ancestor) => LedgerRead::Inherited {
            from: ancestor.period_key,
            row: PeriodBalance::inherited(user_id, key, &ancestor)?,
        },
        None => LedgerRead::Empty {
            row: PeriodBalance::empty(user_id, key),
        },
    };
    Ok(read)
}
