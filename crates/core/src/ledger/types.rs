//! Ledger row and delta types.

use std::ops::{Add, AddAssign, Neg, Sub};

use chrono::{DateTime, Utc};
use moneyflow_shared::types::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::balance::AmountOverflow;
use crate::period::{Granularity, PeriodKey};

/// An amount split across the cash and bank sub-accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashBank {
    /// Cash portion.
    pub cash: Decimal,
    /// Bank portion.
    pub bank: Decimal,
}

impl CashBank {
    /// Zero in both sub-accounts.
    pub const ZERO: Self = Self {
        cash: Decimal::ZERO,
        bank: Decimal::ZERO,
    };

    /// Creates a cash/bank pair.
    #[must_use]
    pub const fn new(cash: Decimal, bank: Decimal) -> Self {
        Self { cash, bank }
    }

    /// Cash plus bank.
    #[must_use]
    pub fn total(self) -> Decimal {
        self.cash + self.bank
    }

    /// `cash + bank`, or `None` if the sum does not fit.
    #[must_use]
    pub fn checked_total(self) -> Option<Decimal> {
        self.cash.checked_add(self.bank)
    }

    /// Returns true if both portions are zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.cash.is_zero() && self.bank.is_zero()
    }
}

impl Add for CashBank {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.cash + rhs.cash, self.bank + rhs.bank)
    }
}

impl AddAssign for CashBank {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for CashBank {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.cash - rhs.cash, self.bank - rhs.bank)
    }
}

impl Neg for CashBank {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.cash, -self.bank)
    }
}

/// Signed change to the three flow accumulators of one period row.
///
/// Reversals carry negative amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDelta {
    /// Income change.
    pub income: CashBank,
    /// Expense change.
    pub expense: CashBank,
    /// Bill change.
    pub bill: CashBank,
}

impl FlowDelta {
    /// Returns true if the delta changes nothing.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.income.is_zero() && self.expense.is_zero() && self.bill.is_zero()
    }

    /// Effect of the delta on the period's closing balance.
    #[must_use]
    pub fn net(&self) -> CashBank {
        self.income - self.expense - self.bill
    }
}

impl Add for FlowDelta {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            income: self.income + rhs.income,
            expense: self.expense + rhs.expense,
            bill: self.bill + rhs.bill,
        }
    }
}

impl Neg for FlowDelta {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            income: -self.income,
            expense: -self.expense,
            bill: -self.bill,
        }
    }
}

/// One `(user, granularity, period)` accumulator row.
///
/// The derived fields (`balance_*`, `cash_amount`, `bank_amount`, totals) are
/// only ever written through [`PeriodBalance::recompute`], so a row built by
/// this crate always satisfies the balance equation. Rows loaded from storage
/// are checked with [`PeriodBalance::breaches`](crate::ledger::balance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBalance {
    /// Owner of the row.
    pub user_id: UserId,
    /// Period the row accumulates.
    pub period_key: PeriodKey,

    /// Cash income recorded in this period.
    pub income_cash_amount: Decimal,
    /// Bank income recorded in this period.
    pub income_bank_amount: Decimal,
    /// Cash expenses recorded in this period.
    pub expense_cash_amount: Decimal,
    /// Bank expenses recorded in this period.
    pub expense_bank_amount: Decimal,
    /// Cash bills recorded in this period.
    pub bill_cash_amount: Decimal,
    /// Bank bills recorded in this period.
    pub bill_bank_amount: Decimal,

    /// Running cash total; mirrors `balance_cash_amount`.
    pub cash_amount: Decimal,
    /// Running bank total; mirrors `balance_bank_amount`.
    pub bank_amount: Decimal,

    /// Cash balance of the nearest earlier row.
    pub previous_cash_amount: Decimal,
    /// Bank balance of the nearest earlier row.
    pub previous_bank_amount: Decimal,

    /// Closing cash balance.
    pub balance_cash_amount: Decimal,
    /// Closing bank balance.
    pub balance_bank_amount: Decimal,

    /// `balance_cash_amount + balance_bank_amount`.
    pub total_balance: Decimal,
    /// `previous_cash_amount + previous_bank_amount`.
    pub total_previous_balance: Decimal,

    /// When the row was first written.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl PeriodBalance {
    /// An all-zero row.
    #[must_use]
    pub fn empty(user_id: UserId, period_key: PeriodKey) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            period_key,
            income_cash_amount: Decimal::ZERO,
            income_bank_amount: Decimal::ZERO,
            expense_cash_amount: Decimal::ZERO,
            expense_bank_amount: Decimal::ZERO,
            bill_cash_amount: Decimal::ZERO,
            bill_bank_amount: Decimal::ZERO,
            cash_amount: Decimal::ZERO,
            bank_amount: Decimal::ZERO,
            previous_cash_amount: Decimal::ZERO,
            previous_bank_amount: Decimal::ZERO,
            balance_cash_amount: Decimal::ZERO,
            balance_bank_amount: Decimal::ZERO,
            total_balance: Decimal::ZERO,
            total_previous_balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh row with no activity whose opening balance is `previous`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if `previous` has no representable total.
    pub fn seeded(
        user_id: UserId,
        period_key: PeriodKey,
        previous: CashBank,
    ) -> Result<Self, AmountOverflow> {
        let mut row = Self::empty(user_id, period_key);
        row.set_previous(previous)?;
        Ok(row)
    }

    /// Granularity of the row.
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.period_key.granularity()
    }

    /// Income accumulators.
    #[must_use]
    pub const fn income(&self) -> CashBank {
        CashBank::new(self.income_cash_amount, self.income_bank_amount)
    }

    /// Expense accumulators.
    #[must_use]
    pub const fn expense(&self) -> CashBank {
        CashBank::new(self.expense_cash_amount, self.expense_bank_amount)
    }

    /// Bill accumulators.
    #[must_use]
    pub const fn bill(&self) -> CashBank {
        CashBank::new(self.bill_cash_amount, self.bill_bank_amount)
    }

    /// Opening balance.
    #[must_use]
    pub const fn previous(&self) -> CashBank {
        CashBank::new(self.previous_cash_amount, self.previous_bank_amount)
    }

    /// Closing balance.
    #[must_use]
    pub const fn balance(&self) -> CashBank {
        CashBank::new(self.balance_cash_amount, self.balance_bank_amount)
    }

    /// Returns true if the row has no income, expense, or bill activity.
    #[must_use]
    pub fn has_no_flows(&self) -> bool {
        self.income().is_zero() && self.expense().is_zero() && self.bill().is_zero()
    }
}
