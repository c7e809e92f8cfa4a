//! `SeaORM` entities.
//!
//! One table per granularity. All six share the same columns; the
//! conversions to and from [`PeriodBalance`](moneyflow_core::ledger::PeriodBalance)
//! are generated per table by `period_balance_model!`.

/// Generates `Model::into_balance` and `ActiveModel::from_balance` for a
/// balance table holding rows of the given granularity.
macro_rules! period_balance_model {
    ($granularity:ident) => {
        /// Granularity of every row in this table.
        pub const GRANULARITY: ::moneyflow_core::period::Granularity =
            ::moneyflow_core::period::Granularity::$granularity;

        impl Model {
            /// Converts the stored row into a ledger row.
            ///
            /// # Errors
            ///
            /// Returns `Corrupt` if the stored period key is not canonical.
            pub fn into_balance(
                self,
            ) -> Result<::moneyflow_core::ledger::PeriodBalance, ::moneyflow_core::ledger::StoreError>
            {
                let period_key =
                    ::moneyflow_core::period::PeriodKey::parse(GRANULARITY, &self.period_key)
                        .map_err(|err| {
                            ::moneyflow_core::ledger::StoreError::Corrupt(format!(
                                "{} row {}: {err}",
                                GRANULARITY, self.id
                            ))
                        })?;
                Ok(::moneyflow_core::ledger::PeriodBalance {
                    user_id: ::moneyflow_shared::types::UserId::from_uuid(self.user_id),
                    period_key,
                    income_cash_amount: self.income_cash_amount,
                    income_bank_amount: self.income_bank_amount,
                    expense_cash_amount: self.expense_cash_amount,
                    expense_bank_amount: self.expense_bank_amount,
                    bill_cash_amount: self.bill_cash_amount,
                    bill_bank_amount: self.bill_bank_amount,
                    cash_amount: self.cash_amount,
                    bank_amount: self.bank_amount,
                    previous_cash_amount: self.previous_cash_amount,
                    previous_bank_amount: self.previous_bank_amount,
                    balance_cash_amount: self.balance_cash_amount,
                    balance_bank_amount: self.balance_bank_amount,
                    total_balance: self.total_balance,
                    total_previous_balance: self.total_previous_balance,
                    created_at: self.created_at.with_timezone(&::chrono::Utc),
                    updated_at: self.updated_at.with_timezone(&::chrono::Utc),
                })
            }
        }

        impl ActiveModel {
            /// Active model with every column set from `row`.
            #[must_use]
            pub fn from_balance(id: Uuid, row: &::moneyflow_core::ledger::PeriodBalance) -> Self {
                use ::sea_orm::ActiveValue::Set;
                Self {
                    id: Set(id),
                    user_id: Set(row.user_id.into_inner()),
                    period_key: Set(row.period_key.to_string()),
                    income_cash_amount: Set(row.income_cash_amount),
                    income_bank_amount: Set(row.income_bank_amount),
                    expense_cash_amount: Set(row.expense_cash_amount),
                    expense_bank_amount: Set(row.expense_bank_amount),
                    bill_cash_amount: Set(row.bill_cash_amount),
                    bill_bank_amount: Set(row.bill_bank_amount),
                    cash_amount: Set(row.cash_amount),
                    bank_amount: Set(row.bank_amount),
                    previous_cash_amount: Set(row.previous_cash_amount),
                    previous_bank_amount: Set(row.previous_bank_amount),
                    balance_cash_amount: Set(row.balance_cash_amount),
                    balance_bank_amount: Set(row.balance_bank_amount),
                    total_balance: Set(row.total_balance),
                    total_previous_balance: Set(row.total_previous_balance),
                    created_at: Set(row.created_at.into()),
                    updated_at: Set(row.updated_at.into()),
                }
            }
        }
    };
}

pub mod annual_balances;
pub mod daily_balances;
pub mod monthly_balances;
pub mod quarterly_balances;
pub mod semiannual_balances;
pub mod weekly_balances;
