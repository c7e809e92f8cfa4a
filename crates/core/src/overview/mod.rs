//! Budget overview projection.
//!
//! A pure transform from one ledger row into the metrics the dashboard
//! shows. The same calculation applies whether the row is stored, inherited,
//! or all-zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::ledger::{AmountOverflow, PeriodBalance};
use crate::period::{Granularity, PeriodKey};

/// Percentage above which spending is flagged as high.
const HIGH_SPENDING_PERCENT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Share of income targeted as savings (20%).
const SAVINGS_GOAL_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Budget overview for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetOverview {
    /// Granularity requested.
    pub granularity: Granularity,
    /// Period requested.
    pub period_key: PeriodKey,
    /// Income, cash + bank.
    pub total_income: Decimal,
    /// Expenses, cash + bank.
    pub spent_amount: Decimal,
    /// Unpaid bills, cash + bank.
    pub upcoming_amount: Decimal,
    /// `spent_amount + upcoming_amount`.
    pub combined_expense: Decimal,
    /// `total_income - combined_expense`.
    pub available_balance: Decimal,
    /// `combined_expense / total_income` as a percentage, clamped to 0-100.
    pub expense_percent: Decimal,
    /// `spent_amount` per day over the period's nominal length.
    pub daily_rate: Decimal,
    /// `expense_percent > 80`.
    pub high_spending: bool,
    /// `available_balance < 0`.
    pub is_negative_balance: bool,
    /// Closing balance of the period.
    pub total_balance: Decimal,
    /// Balance carried in from the previous period.
    pub money_flow: MoneyFlow,
    /// Split of the closing balance between cash and bank.
    pub cash_bank_distribution: CashBankDistribution,
    /// Progress toward saving a fifth of income.
    pub savings: Savings,
}

/// Money carried between periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoneyFlow {
    /// Opening balance.
    pub from_previous: Decimal,
}

/// Cash/bank split of the closing balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashBankDistribution {
    /// Closing cash balance.
    pub cash_amount: Decimal,
    /// Cash share of the total, 0 when the total is not positive.
    pub cash_percent: Decimal,
    /// Closing bank balance.
    pub bank_amount: Decimal,
    /// Bank share of the total, 0 when the total is not positive.
    pub bank_percent: Decimal,
    /// Cash + bank.
    pub total_amount: Decimal,
}

/// Savings progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Savings {
    /// Amount left after expenses and bills.
    pub available: Decimal,
    /// 20% of income.
    pub goal: Decimal,
    /// `available / goal` as a percentage, 0 when there is no goal.
    pub percent: Decimal,
}

impl BudgetOverview {
    /// Projects a ledger row into an overview.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] if a sum or ratio does not fit in a
    /// `Decimal`.
    pub fn calculate(row: &PeriodBalance) -> Result<Self, AmountOverflow> {
        let overflow = AmountOverflow {
            period_key: row.period_key,
        };
        let granularity = row.granularity();
        let total_income = row.income().checked_total().ok_or(overflow)?;
        let spent_amount = row.expense().checked_total().ok_or(overflow)?;
        let upcoming_amount = row.bill().checked_total().ok_or(overflow)?;
        let combined_expense = spent_amount.checked_add(upcoming_amount).ok_or(overflow)?;
        let available_balance = total_income.checked_sub(combined_expense).ok_or(overflow)?;

        let expense_percent = percent_of(combined_expense, total_income)
            .ok_or(overflow)?
            .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        let daily_rate = spent_amount
            .checked_div(Decimal::from(granularity.period_length_days()))
            .map(round2)
            .ok_or(overflow)?;

        let cash_amount = row.cash_amount;
        let bank_amount = row.bank_amount;
        let total_amount = cash_amount.checked_add(bank_amount).ok_or(overflow)?;

        let goal = total_income
            .checked_mul(SAVINGS_GOAL_RATE)
            .map(round2)
            .ok_or(overflow)?;

        Ok(Self {
            granularity,
            period_key: row.period_key,
            total_income,
            spent_amount,
            upcoming_amount,
            combined_expense,
            available_balance,
            expense_percent,
            daily_rate,
            high_spending: expense_percent > HIGH_SPENDING_PERCENT,
            is_negative_balance: available_balance < Decimal::ZERO,
            total_balance: row.total_balance,
            money_flow: MoneyFlow {
                from_previous: row.total_previous_balance,
            },
            cash_bank_distribution: CashBankDistribution {
                cash_amount,
                cash_percent: percent_of(cash_amount, total_amount).ok_or(overflow)?,
                bank_amount,
                bank_percent: percent_of(bank_amount, total_amount).ok_or(overflow)?,
                total_amount,
            },
            savings: Savings {
                available: available_balance,
                goal,
                percent: percent_of(available_balance, goal).ok_or(overflow)?,
            },
        })
    }
}

/// `part / whole * 100` rounded to cents, zero when `whole` is not positive,
/// `None` on overflow.
fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }
    part.checked_mul(Decimal::ONE_HUNDRED)?
        .checked_div(whole)
        .map(round2)
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
