//! Core business logic for MoneyFlow.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Storage is reached only through the [`ledger::BalanceStore`] trait.
//!
//! # Modules
//!
//! - `period` - Granularities and canonical period keys
//! - `ledger` - Period rows, mutations, invariants and the ledger service
//! - `cascade` - Forward propagation of balance corrections
//! - `inheritance` - Read-side balances for periods without a row
//! - `overview` - Budget overview metrics

pub mod cascade;
pub mod inheritance;
pub mod ledger;
pub mod overview;
pub mod period;
