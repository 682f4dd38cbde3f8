//! Transaction storage boundary.
//!
//! The store owns the atomic unit of work that persists a transaction header,
//! its items, and the conditional stock decrement for every item. It is the
//! only place where the non-negative stock invariant is enforced.

pub mod in_memory;
pub mod postgres;
pub mod query;

use std::sync::Arc;

use thiserror::Error;

use tillpoint_core::{ProductId, TransactionId};
use tillpoint_sales::{NewTransaction, Transaction};

pub use in_memory::InMemoryTransactionStore;
pub use postgres::PostgresTransactionStore;
pub use query::{ListQuery, Page, SortDirection, SortKey};

/// Store operation error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A conditional stock decrement matched no row; the unit of work was
    /// rolled back.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    /// No live transaction with this id.
    #[error("transaction {0} not found")]
    NotFound(TransactionId),

    /// Connectivity, constraint or decoding failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Transaction persistence.
///
/// ## Create semantics
///
/// `create()` runs as a single unit of work with two terminal outcomes:
/// - **Committed**: header, every item and every stock decrement applied
/// - **Aborted**: nothing applied
///
/// Each item's stock decrement is conditional (`stock >= quantity`) and
/// evaluated atomically by the storage engine, so concurrent creates racing
/// on the same product can never drive stock negative.
///
/// ## Read semantics
///
/// Soft-deleted transactions are invisible to `get` and `list`. Items come
/// back in creation order.
#[async_trait::async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a transaction with its items and stock decrements atomically.
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError>;

    /// Load one live transaction with its items.
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Load one page of live transactions matching the query.
    async fn list(&self, query: &ListQuery) -> Result<Page<Transaction>, StoreError>;

    /// Mark a live transaction deleted. Items and stock are untouched.
    async fn soft_delete(&self, id: TransactionId) -> Result<(), StoreError>;

    /// Check that storage is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> TransactionStore for Arc<S>
where
    S: TransactionStore + ?Sized,
{
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        (**self).create(transaction).await
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Transaction>, StoreError> {
        (**self).list(query).await
    }

    async fn soft_delete(&self, id: TransactionId) -> Result<(), StoreError> {
        (**self).soft_delete(id).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}
