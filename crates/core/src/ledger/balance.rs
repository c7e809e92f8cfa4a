//! Row arithmetic and invariant checks.
//!
//! Two invariants hold for every stored row:
//!
//! - **Balance equation**: `balance = previous + income - expense - bill`,
//!   per sub-account, with `cash_amount`/`bank_amount` mirroring the balance
//!   and both totals equal to the cash + bank sums.
//! - **Chaining**: `previous` equals the balance of the nearest earlier row of
//!   the same user and granularity, or zero if there is none.

use std::fmt;

use chrono::Utc;
use moneyflow_shared::types::UserId;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::store::StoreError;
use super::types::{CashBank, FlowDelta, PeriodBalance};
use crate::period::PeriodKey;

/// Which invariant a row breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantRule {
    /// `balance_* != previous_* + income_* - expense_* - bill_*`.
    BalanceEquation,
    /// `cash_amount`/`bank_amount` differ from the balance.
    RunningTotal,
    /// `total_balance` or `total_previous_balance` is not the cash + bank sum.
    Totals,
    /// `previous_*` differs from the nearest earlier row's balance.
    Chaining,
}

/// One field of one row that disagrees with its expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantBreach {
    /// Row holding the bad value.
    pub period_key: PeriodKey,
    /// Broken rule.
    pub rule: InvariantRule,
    /// Column name.
    pub field: &'static str,
    /// Value the invariant requires.
    pub expected: Decimal,
    /// Value stored.
    pub actual: Decimal,
}

impl fmt::Display for InvariantBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {:?} on {} (expected {}, found {})",
            self.period_key.granularity(),
            self.period_key,
            self.rule,
            self.field,
            self.expected,
            self.actual
        )
    }
}

/// A row amount left the range `Decimal` can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[error("amount overflow in {} row {period_key}", .period_key.granularity())]
pub struct AmountOverflow {
    /// Row whose arithmetic overflowed.
    pub period_key: PeriodKey,
}

impl PeriodBalance {
    /// Rewrites every derived field from the accumulators and `previous_*`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] and leaves the row untouched if a derived
    /// amount does not fit.
    pub fn recompute(&mut self) -> Result<(), AmountOverflow> {
        let overflow = AmountOverflow {
            period_key: self.period_key,
        };
        let balance = self.implied_balance().ok_or(overflow)?;
        let total_balance = balance.checked_total().ok_or(overflow)?;
        let total_previous_balance = self.previous().checked_total().ok_or(overflow)?;

        self.balance_cash_amount = balance.cash;
        self.balance_bank_amount = balance.bank;
        self.cash_amount = balance.cash;
        self.bank_amount = balance.bank;
        self.total_balance = total_balance;
        self.total_previous_balance = total_previous_balance;
        Ok(())
    }

    /// Adds a signed delta to the flow accumulators and recomputes.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] and leaves the row untouched if an
    /// accumulator or a derived amount does not fit.
    pub fn apply_delta(&mut self, delta: &FlowDelta) -> Result<(), AmountOverflow> {
        let overflow = AmountOverflow {
            period_key: self.period_key,
        };
        let add = |current: Decimal, change: Decimal| current.checked_add(change).ok_or(overflow);

        let mut next = self.clone();
        next.income_cash_amount = add(self.income_cash_amount, delta.income.cash)?;
        next.income_bank_amount = add(self.income_bank_amount, delta.income.bank)?;
        next.expense_cash_amount = add(self.expense_cash_amount, delta.expense.cash)?;
        next.expense_bank_amount = add(self.expense_bank_amount, delta.expense.bank)?;
        next.bill_cash_amount = add(self.bill_cash_amount, delta.bill.cash)?;
        next.bill_bank_amount = add(self.bill_bank_amount, delta.bill.bank)?;
        next.recompute()?;
        *self = next;
        Ok(())
    }

    /// Replaces the opening balance and recomputes.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] and leaves the row untouched if a derived
    /// amount does not fit.
    pub fn set_previous(&mut self, previous: CashBank) -> Result<(), AmountOverflow> {
        let mut next = self.clone();
        next.previous_cash_amount = previous.cash;
        next.previous_bank_amount = previous.bank;
        next.recompute()?;
        *self = next;
        Ok(())
    }

    /// Read-side stand-in for a period that has no row: carries the
    /// ancestor's closing balance forward with no activity.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if the ancestor's balance has no
    /// representable total.
    pub fn inherited(
        user_id: UserId,
        period_key: PeriodKey,
        ancestor: &Self,
    ) -> Result<Self, AmountOverflow> {
        Self::seeded(user_id, period_key, ancestor.balance())
    }

    /// `previous + income - expense - bill` per sub-account, `None` on
    /// overflow.
    fn implied_balance(&self) -> Option<CashBank> {
        let side = |previous: Decimal, income: Decimal, expense: Decimal, bill: Decimal| {
            previous
                .checked_add(income)?
                .checked_sub(expense)?
                .checked_sub(bill)
        };
        Some(CashBank::new(
            side(
                self.previous_cash_amount,
                self.income_cash_amount,
                self.expense_cash_amount,
                self.bill_cash_amount,
            )?,
            side(
                self.previous_bank_amount,
                self.income_bank_amount,
                self.expense_bank_amount,
                self.bill_bank_amount,
            )?,
        ))
    }

    /// Returns true if every stored amount matches `other`, ignoring
    /// timestamps.
    #[must_use]
    pub fn same_amounts(&self, other: &Self) -> bool {
        self.amounts() == other.amounts()
    }

    fn amounts(&self) -> [Decimal; 14] {
        [
            self.income_cash_amount,
            self.income_bank_amount,
            self.expense_cash_amount,
            self.expense_bank_amount,
            self.bill_cash_amount,
            self.bill_bank_amount,
            self.cash_amount,
            self.bank_amount,
            self.previous_cash_amount,
            self.previous_bank_amount,
            self.balance_cash_amount,
            self.balance_bank_amount,
            self.total_balance,
            self.total_previous_balance,
        ]
    }

    /// Every field that breaks the balance equation, running totals, or
    /// totals. Chaining needs the neighbouring row and is checked by
    /// [`audit_chain`].
    #[must_use]
    pub fn breaches(&self) -> Vec<InvariantBreach> {
        // An amount that cannot be represented never matches a stored one
        let unrepresentable = CashBank::new(Decimal::MAX, Decimal::MAX);
        let expected = self.implied_balance().unwrap_or(unrepresentable);

        let checks = [
            (
                InvariantRule::BalanceEquation,
                "balance_cash_amount",
                expected.cash,
                self.balance_cash_amount,
            ),
            (
                InvariantRule::BalanceEquation,
                "balance_bank_amount",
                expected.bank,
                self.balance_bank_amount,
            ),
            (
                InvariantRule::RunningTotal,
                "cash_amount",
                self.balance_cash_amount,
                self.cash_amount,
            ),
            (
                InvariantRule::RunningTotal,
                "bank_amount",
                self.balance_bank_amount,
                self.bank_amount,
            ),
            (
                InvariantRule::Totals,
                "total_balance",
                self.balance().checked_total().unwrap_or(Decimal::MAX),
                self.total_balance,
            ),
            (
                InvariantRule::Totals,
                "total_previous_balance",
                self.previous().checked_total().unwrap_or(Decimal::MAX),
                self.total_previous_balance,
            ),
        ];

        checks
            .into_iter()
            .filter(|(_, _, expected, actual)| expected != actual)
            .map(|(rule, field, expected, actual)| InvariantBreach {
                period_key: self.period_key,
                rule,
                field,
                expected,
                actual,
            })
            .collect()
    }

    /// Fails with the first breach, if any.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantBreach`] found by [`breaches`](Self::breaches).
    pub fn verify(&self) -> Result<(), InvariantBreach> {
        match self.breaches().into_iter().next() {
            Some(breach) => Err(breach),
            None => Ok(()),
        }
    }
}

/// Applies `delta` to the row at `key`, creating it when absent.
///
/// A new row opens at `seed`; an existing row is checked before it is
/// modified so a corrupted row is never silently repaired by recomputation.
/// Storage backends call this inside their atomic read-modify-write.
///
/// # Errors
///
/// - `Invariant` with the first breach of the existing row
/// - `Overflow` if the delta pushes an amount out of range
pub fn upsert_row(
    existing: Option<PeriodBalance>,
    user_id: UserId,
    key: PeriodKey,
    delta: &FlowDelta,
    seed: CashBank,
) -> Result<PeriodBalance, StoreError> {
    let mut row = match existing {
        Some(row) => {
            row.verify()?;
            row
        }
        None => PeriodBalance::seeded(user_id, key, seed)?,
    };
    row.apply_delta(delta)?;
    row.updated_at = Utc::now();
    Ok(row)
}

/// Checks every row of one user and granularity, in ascending key order,
/// against both invariants.
#[must_use]
pub fn audit_chain(rows: &[PeriodBalance]) -> Vec<InvariantBreach> {
    let mut breaches = Vec::new();
    let mut prior = CashBank::ZERO;
    for row in rows {
        breaches.extend(row.breaches());
        for (field, expected, actual) in [
            ("previous_cash_amount", prior.cash, row.previous_cash_amount),
            ("previous_bank_amount", prior.bank, row.previous_bank_amount),
        ] {
            if expected != actual {
                breaches.push(InvariantBreach {
                    period_key: row.period_key,
                    rule: InvariantRule::Chaining,
                    field,
                    expected,
                    actual,
                });
            }
        }
        prior = row.balance();
    }
    breaches
}
