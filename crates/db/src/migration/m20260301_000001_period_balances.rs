//! Period balance tables.
//!
//! One table per granularity. `period_key` holds the canonical key text,
//! which sorts in period order under the "C" collation, so the unique
//! `(user_id, period_key)` index also serves every range scan the ledger
//! makes.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(PERIOD_BALANCES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_PERIOD_BALANCES_SQL).await?;
        Ok(())
    }
}

const PERIOD_BALANCES_SQL: &str = r#"
-- Daily period balances
CREATE TABLE daily_balances (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    period_key VARCHAR(10) COLLATE "C" NOT NULL,
    income_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    income_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_previous_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_daily_balances_user_period UNIQUE (user_id, period_key)
);

-- Weekly period balances
CREATE TABLE weekly_balances (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    period_key VARCHAR(10) COLLATE "C" NOT NULL,
    income_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    income_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_previous_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_weekly_balances_user_period UNIQUE (user_id, period_key)
);

-- Monthly period balances
CREATE TABLE monthly_balances (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    period_key VARCHAR(10) COLLATE "C" NOT NULL,
    income_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    income_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_previous_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_monthly_balances_user_period UNIQUE (user_id, period_key)
);

-- Quarterly period balances
CREATE TABLE quarterly_balances (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    period_key VARCHAR(10) COLLATE "C" NOT NULL,
    income_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    income_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_previous_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_quarterly_balances_user_period UNIQUE (user_id, period_key)
);

-- Semiannual period balances
CREATE TABLE semiannual_balances (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    period_key VARCHAR(10) COLLATE "C" NOT NULL,
    income_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    income_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_previous_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_semiannual_balances_user_period UNIQUE (user_id, period_key)
);

-- Annual period balances
CREATE TABLE annual_balances (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    period_key VARCHAR(10) COLLATE "C" NOT NULL,
    income_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    income_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expense_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bill_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    previous_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_cash_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    balance_bank_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_previous_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_annual_balances_user_period UNIQUE (user_id, period_key)
);
"#;

const DROP_PERIOD_BALANCES_SQL: &str = r"
DROP TABLE IF EXISTS annual_balances;
DROP TABLE IF EXISTS semiannual_balances;
DROP TABLE IF EXISTS quarterly_balances;
DROP TABLE IF EXISTS monthly_balances;
DROP TABLE IF EXISTS weekly_balances;
DROP TABLE IF EXISTS daily_balances;
";
