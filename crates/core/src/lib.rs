//! `tillpoint-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod money;

pub use error::DomainError;
pub use id::{ProductId, TransactionId, TransactionItemId};
pub use money::Money;
