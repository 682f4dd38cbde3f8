//! Sales transactions domain module.
//!
//! This crate contains business rules for point-of-sale transactions,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod transaction;

pub use transaction::{
    LineRequest, NewTransaction, NewTransactionItem, Transaction, TransactionItem, ValidatedLine,
    validate_lines,
};
