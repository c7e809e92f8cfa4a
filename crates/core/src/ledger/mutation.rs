//! Transaction mutations coming from the income, expense, and bill
//! collaborators.

use chrono::NaiveDate;
use moneyflow_shared::types::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::types::{CashBank, FlowDelta};
use crate::period::{Granularity, PeriodKey};

/// Exclusive upper bound on a transaction amount (10^15), the integer range
/// of a `NUMERIC(19, 4)` column.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Most decimal places an amount may carry.
pub const MAX_SCALE: u32 = 4;

/// What a transaction is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money in.
    Income,
    /// Money spent.
    Expense,
    /// Bill obligation.
    Bill,
}

/// Sub-account the money moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash sub-account.
    Cash,
    /// Bank sub-account.
    Bank,
}

/// Whether the transaction is being added or taken back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    /// Add the transaction's amount.
    #[default]
    Apply,
    /// Subtract the transaction's amount (delete, or the first half of an edit).
    Reverse,
}

/// A transaction being applied to or reversed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMutation {
    /// Owner of the transaction.
    pub user_id: UserId,
    /// Calendar date the transaction belongs to.
    pub date: NaiveDate,
    /// Positive transaction amount.
    pub amount: Decimal,
    /// Cash or bank.
    pub payment_method: PaymentMethod,
    /// Income, expense, or bill.
    pub kind: TransactionKind,
    /// Apply or reverse; defaults to apply.
    #[serde(default)]
    pub operation: MutationOp,
}

impl TransactionMutation {
    /// The same transaction with the opposite operation.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            operation: match self.operation {
                MutationOp::Apply => MutationOp::Reverse,
                MutationOp::Reverse => MutationOp::Apply,
            },
            ..self.clone()
        }
    }

    /// Rejects mutations that must not touch any row.
    ///
    /// # Errors
    ///
    /// - `Validation` if the amount is not positive, reaches [`MAX_AMOUNT`],
    ///   or has more than [`MAX_SCALE`] significant decimal places
    /// - `Period` if the date falls outside the supported calendar
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.amount >= MAX_AMOUNT {
            return Err(LedgerError::Validation(format!(
                "amount must be below {MAX_AMOUNT}, got {}",
                self.amount
            )));
        }
        // Trailing zeros are not precision: 1.50000 is stored as 1.5000
        if self.amount.normalize().scale() > MAX_SCALE {
            return Err(LedgerError::Validation(format!(
                "amount may have at most {MAX_SCALE} decimal places, got {}",
                self.amount
            )));
        }
        for granularity in Granularity::ALL {
            PeriodKey::from_date(granularity, self.date)?;
        }
        Ok(())
    }

    /// Signed delta this mutation applies to its period rows.
    #[must_use]
    pub fn delta(&self) -> FlowDelta {
        let signed = match self.operation {
            MutationOp::Apply => self.amount,
            MutationOp::Reverse => -self.amount,
        };
        let split = match self.payment_method {
            PaymentMethod::Cash => CashBank::new(signed, Decimal::ZERO),
            PaymentMethod::Bank => CashBank::new(Decimal::ZERO, signed),
        };
        let mut delta = FlowDelta::default();
        match self.kind {
            TransactionKind::Income => delta.income = split,
            TransactionKind::Expense => delta.expense = split,
            TransactionKind::Bill => delta.bill = split,
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn mutation(kind: TransactionKind, method: PaymentMethod, amount: Decimal) -> TransactionMutation {
        TransactionMutation {
            user_id: UserId::new(),
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            amount,
            payment_method: method,
            kind,
            operation: MutationOp::Apply,
        }
    }

    #[rstest]
    #[case(TransactionKind::Income, PaymentMethod::Cash)]
    #[case(TransactionKind::Income, PaymentMethod::Bank)]
    #[case(TransactionKind::Expense, PaymentMethod::Cash)]
    #[case(TransactionKind::Expense, PaymentMethod::Bank)]
    #[case(TransactionKind::Bill, PaymentMethod::Cash)]
    #[case(TransactionKind::Bill, PaymentMethod::Bank)]
    fn test_delta_lands_in_one_accumulator(
        #[case] kind: TransactionKind,
        #[case] method: PaymentMethod,
    ) {
        let m = mutation(kind, method, dec!(42.10));
        let delta = m.delta();
        let slot = match kind {
            TransactionKind::Income => delta.income,
            TransactionKind::Expense => delta.expense,
            TransactionKind::Bill => delta.bill,
        };
        let amount = match method {
            PaymentMethod::Cash => slot.cash,
            PaymentMethod::Bank => slot.bank,
        };
        assert_eq!(amount, dec!(42.10));
        assert_eq!(
            delta.income.total() + delta.expense.total() + delta.bill.total(),
            dec!(42.10)
        );

        assert_eq!(m.reversed().delta(), -delta);
        assert_eq!(m.reversed().reversed(), m);
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5))]
    fn test_validate_rejects_non_positive_amount(#[case] amount: Decimal) {
        let m = mutation(TransactionKind::Expense, PaymentMethod::Cash, amount);
        assert!(matches!(m.validate(), Err(LedgerError::Validation(_))));
    }

    #[rstest]
    #[case(MAX_AMOUNT)]
    #[case(dec!(1000000000000000.5))]
    #[case(Decimal::MAX)]
    fn test_validate_rejects_amount_at_or_above_max(#[case] amount: Decimal) {
        let m = mutation(TransactionKind::Income, PaymentMethod::Cash, amount);
        assert!(matches!(m.validate(), Err(LedgerError::Validation(_))));
    }

    #[rstest]
    #[case(dec!(0.00001))]
    #[case(dec!(12.34567))]
    fn test_validate_rejects_sub_storage_precision(#[case] amount: Decimal) {
        let m = mutation(TransactionKind::Bill, PaymentMethod::Bank, amount);
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("decimal places"), "{err}");
    }

    #[rstest]
    #[case(dec!(999999999999999.9999))]
    #[case(dec!(0.0001))]
    #[case(dec!(1.50000))]
    #[case(dec!(42))]
    fn test_validate_accepts_storable_amounts(#[case] amount: Decimal) {
        let m = mutation(TransactionKind::Expense, PaymentMethod::Cash, amount);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_max_amount_is_ten_to_the_fifteenth() {
        assert_eq!(MAX_AMOUNT, dec!(1000000000000000));
    }

    #[test]
    fn test_validate_rejects_unsupported_year() {
        let mut m = mutation(TransactionKind::Income, PaymentMethod::Bank, dec!(1));
        m.date = NaiveDate::from_ymd_opt(10_000, 1, 1).unwrap();
        assert!(matches!(m.validate(), Err(LedgerError::Period(_))));
    }

    #[test]
    fn test_deserialize_defaults_to_apply() {
        let json = serde_json::json!({
            "user_id": "0190f3c4-5b6a-7c8d-9e0f-112233445566",
            "date": "2024-03-15",
            "amount": "1000",
            "payment_method": "cash",
            "kind": "income"
        });
        let m: TransactionMutation = serde_json::from_value(json).unwrap();
        assert_eq!(m.operation, MutationOp::Apply);
        assert_eq!(m.amount, dec!(1000));
    }

    #[test]
    fn test_deserialize_rejects_unknown_payment_method() {
        let json = serde_json::json!({
            "user_id": "0190f3c4-5b6a-7c8d-9e0f-112233445566",
            "date": "2024-03-15",
            "amount": "10",
            "payment_method": "card",
            "kind": "income"
        });
        assert!(serde_json::from_value::<TransactionMutation>(json).is_err());
    }
}
