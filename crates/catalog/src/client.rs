use std::collections::HashMap;
use std::sync::Arc;

use futures::{FutureExt, StreamExt, stream};
use thiserror::Error;

use tillpoint_core::ProductId;

use crate::snapshot::ProductSnapshot;

/// Upper bound on in-flight lookups during a batch fetch.
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Catalog lookup failure for a single product.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog answered with an explicit not-found.
    #[error("product {0} not found in catalog")]
    NotFound(ProductId),

    /// Transport failure, timeout, non-success status or malformed payload.
    #[error("catalog unavailable for product {product_id}: {reason}")]
    Unavailable {
        product_id: ProductId,
        reason: String,
    },
}

impl CatalogError {
    pub fn unavailable(product_id: ProductId, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            product_id,
            reason: reason.into(),
        }
    }
}

/// Read-only accessor for product snapshots.
///
/// `fetch_one` is strict: any failure is returned to the caller.
/// `fetch_many` is lenient: failures are logged and the id is left out of the
/// result, so the call as a whole never fails.
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Look up a single product (one round-trip, bounded by the client timeout).
    async fn fetch_one(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError>;

    /// Maximum number of concurrent lookups issued by `fetch_many`.
    fn max_concurrent_lookups(&self) -> usize {
        DEFAULT_MAX_CONCURRENT_LOOKUPS
    }

    /// Look up many products independently; failed ids are omitted.
    ///
    /// Duplicate ids are looked up once.
    async fn fetch_many(&self, product_ids: &[ProductId]) -> HashMap<ProductId, ProductSnapshot> {
        let mut unique = product_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let lookups: Vec<_> = unique
            .into_iter()
            .map(|id| self.fetch_one(id).map(move |res| (id, res)))
            .collect();

        let results: Vec<(ProductId, Result<ProductSnapshot, CatalogError>)> =
            stream::iter(lookups)
                .buffer_unordered(self.max_concurrent_lookups().max(1))
                .collect()
                .await;

        let mut found = HashMap::with_capacity(results.len());
        let mut failed = Vec::new();
        for (id, res) in results {
            match res {
                Ok(snapshot) => {
                    found.insert(id, snapshot);
                }
                Err(e) => {
                    tracing::warn!(product_id = %id, error = %e, "catalog lookup failed");
                    failed.push(id.get());
                }
            }
        }

        if !failed.is_empty() {
            failed.sort_unstable();
            tracing::warn!(?failed, "could not fetch some products; omitting them from batch");
        }

        found
    }
}

#[async_trait::async_trait]
impl<C> CatalogClient for Arc<C>
where
    C: CatalogClient + ?Sized,
{
    async fn fetch_one(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError> {
        (**self).fetch_one(product_id).await
    }

    fn max_concurrent_lookups(&self) -> usize {
        (**self).max_concurrent_lookups()
    }

    async fn fetch_many(&self, product_ids: &[ProductId]) -> HashMap<ProductId, ProductSnapshot> {
        (**self).fetch_many(product_ids).await
    }
}
