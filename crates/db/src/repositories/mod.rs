//! Repository implementations for database operations.

pub mod period_balance;

pub use period_balance::PeriodBalanceRepository;
