//! Transaction orchestration.
//!
//! The create path is strict: every product must be priced by a fresh catalog
//! lookup before anything is written, and any lookup failure aborts the
//! request. The read path is lenient: catalog failures degrade individual
//! items to fallback rendering and are only logged.

mod view;

use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use tillpoint_catalog::{CatalogClient, CatalogError};
use tillpoint_core::{DomainError, ProductId, TransactionId};
use tillpoint_sales::{LineRequest, NewTransaction, Transaction, validate_lines};

use crate::store::{ListQuery, Page, StoreError, TransactionStore};

pub use view::{TransactionItemView, TransactionView};

/// Failures surfaced by `TransactionService`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product service unavailable while fetching product {product_id}: {reason}")]
    UpstreamUnavailable { product_id: ProductId, reason: String },

    /// Requested quantity exceeds stock. `available` is known when the
    /// shortfall was caught by the pre-check, unknown when the storage-level
    /// decrement rejected it.
    #[error("{}", insufficient_stock_message(.product_id, .product_name, .available, .requested))]
    InsufficientStock {
        product_id: ProductId,
        product_name: Option<String>,
        available: Option<i32>,
        requested: i32,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),
}

fn insufficient_stock_message(
    product_id: &ProductId,
    product_name: &Option<String>,
    available: &Option<i32>,
    requested: &i32,
) -> String {
    let product = match product_name {
        Some(name) => format!("'{name}'"),
        None => format!("{product_id}"),
    };
    match available {
        Some(available) => format!(
            "insufficient stock for product {product}. Available: {available}, Requested: {requested}"
        ),
        None => format!("insufficient stock for product {product}. Requested: {requested}"),
    }
}

impl From<DomainError> for TransactionError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvariantViolation(msg) => Self::Persistence(msg),
        }
    }
}

impl From<CatalogError> for TransactionError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(product_id) => Self::ProductNotFound(product_id),
            CatalogError::Unavailable { product_id, reason } => {
                Self::UpstreamUnavailable { product_id, reason }
            }
        }
    }
}

/// Creates and reads sales transactions.
#[derive(Debug, Clone)]
pub struct TransactionService<C, S> {
    catalog: C,
    store: S,
}

impl<C, S> TransactionService<C, S>
where
    C: CatalogClient,
    S: TransactionStore,
{
    pub fn new(catalog: C, store: S) -> Self {
        Self { catalog, store }
    }

    /// Validate, price and atomically persist a sale.
    ///
    /// Lookups run one line at a time, in caller order. The stock pre-check
    /// uses the cumulative demand for a product across all lines; the store's
    /// conditional decrement is the authoritative re-check.
    #[instrument(skip(self, lines), fields(line_count = lines.len()), err)]
    pub async fn create_transaction(
        &self,
        lines: &[LineRequest],
    ) -> Result<TransactionView, TransactionError> {
        let lines = validate_lines(lines)?;

        let mut demand: HashMap<ProductId, i32> = HashMap::new();
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self.catalog.fetch_one(line.product_id).await?;

            let requested = demand.entry(line.product_id).or_insert(0);
            *requested = requested.saturating_add(line.quantity);
            if !product.has_stock_for(*requested) {
                return Err(TransactionError::InsufficientStock {
                    product_id: product.id,
                    product_name: Some(product.name),
                    available: Some(product.stock),
                    requested: *requested,
                });
            }

            items.push(line.priced(product.name, product.price)?);
        }

        let transaction = NewTransaction::new(Utc::now(), items)?;
        let names: HashMap<ProductId, String> = transaction
            .items()
            .iter()
            .map(|i| (i.product_id, i.product_name.clone()))
            .collect();

        let stored = self.store.create(transaction).await.map_err(|e| match e {
            StoreError::InsufficientStock(product_id) => {
                tracing::warn!(%product_id, "stock changed after pre-check; sale rejected");
                TransactionError::InsufficientStock {
                    product_id,
                    product_name: names.get(&product_id).cloned(),
                    available: None,
                    requested: demand.get(&product_id).copied().unwrap_or_default(),
                }
            }
            other => TransactionError::Persistence(other.to_string()),
        })?;

        tracing::info!(
            transaction_id = %stored.id,
            total_amount = %stored.total_amount,
            item_count = stored.items.len(),
            "transaction created"
        );
        Ok(TransactionView::captured(stored))
    }

    /// Load one transaction, enriched with live catalog data where possible.
    #[instrument(skip(self), err)]
    pub async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<TransactionView, TransactionError> {
        let transaction = self
            .store
            .get(id)
            .await
            .map_err(persistence)?
            .ok_or(TransactionError::TransactionNotFound(id))?;

        let live = self.lookup_products(std::slice::from_ref(&transaction)).await;
        Ok(TransactionView::enriched(transaction, &live))
    }

    /// Load one page of transactions.
    ///
    /// Every entry on the page is rendered; items whose product cannot be
    /// fetched fall back individually.
    #[instrument(skip(self), err)]
    pub async fn list_transactions(
        &self,
        query: ListQuery,
    ) -> Result<Page<TransactionView>, TransactionError> {
        let page = self.store.list(&query).await.map_err(persistence)?;
        let live = self.lookup_products(&page.items).await;
        Ok(page.map(|t| TransactionView::enriched(t, &live)))
    }

    /// Soft-delete a transaction. Items and stock are left as they are.
    #[instrument(skip(self), err)]
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<(), TransactionError> {
        self.store.soft_delete(id).await.map_err(|e| match e {
            StoreError::NotFound(id) => TransactionError::TransactionNotFound(id),
            other => persistence(other),
        })?;
        tracing::info!(transaction_id = %id, "transaction deleted");
        Ok(())
    }

    pub async fn ping_storage(&self) -> Result<(), TransactionError> {
        self.store.ping().await.map_err(persistence)
    }

    async fn lookup_products(
        &self,
        transactions: &[Transaction],
    ) -> HashMap<ProductId, tillpoint_catalog::ProductSnapshot> {
        let ids: Vec<ProductId> = transactions
            .iter()
            .flat_map(|t| t.items.iter().map(|i| i.product_id))
            .collect();
        if ids.is_empty() {
            return HashMap::new();
        }
        self.catalog.fetch_many(&ids).await
    }
}

fn persistence(err: StoreError) -> TransactionError {
    TransactionError::Persistence(err.to_string())
}

#[cfg(test)]
mod tests;
