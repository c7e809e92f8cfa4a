//! `SeaORM` Entity for daily_balances table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub period_key: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub income_cash_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub income_bank_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub expense_cash_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub expense_bank_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub bill_cash_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub bill_bank_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cash_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub bank_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub previous_cash_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub previous_bank_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_cash_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_bank_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_previous_balance: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

period_balance_model!(Daily);
