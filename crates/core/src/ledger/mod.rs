//! Period-balance ledger.
//!
//! This module implements the core ledger functionality:
//! - Period rows and their cash/bank accumulators
//! - Row arithmetic and invariant checks
//! - Transaction mutations and their signed deltas
//! - The storage seam and an in-memory backend
//! - Retry and horizon policy
//! - The ledger service tying upserts, cascades and reads together

pub mod balance;
pub mod error;
pub mod memory;
pub mod mutation;
pub mod policy;
pub mod report;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod service_props;

pub use balance::{AmountOverflow, InvariantBreach, InvariantRule, audit_chain, upsert_row};
pub use error::LedgerError;
pub use memory::{FaultPoint, InMemoryBalanceStore};
pub use mutation::{
    MAX_AMOUNT, MAX_SCALE, MutationOp, PaymentMethod, TransactionKind, TransactionMutation,
};
pub use policy::{LedgerPolicy, RetryPolicy};
pub use report::{
    EditReport, GranularityFailure, GranularityOutcome, MutationReport, RebuildReport,
    UpdateStage,
};
pub use service::LedgerService;
pub use store::{BalanceStore, StoreError};
pub use types::{CashBank, FlowDelta, PeriodBalance};
