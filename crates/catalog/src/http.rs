//! HTTP-backed catalog client.
//!
//! Contract: `GET {base_url}/api/products/{id}` answers
//! `{success, message, data: {id, name, price, stock}}`.
//!
//! | Outcome | Result |
//! |---|---|
//! | 200 + `success=true` + `data` | `Ok(snapshot)` |
//! | 404 | `CatalogError::NotFound` |
//! | any other status | `CatalogError::Unavailable` |
//! | 200 + `success=false` | `CatalogError::Unavailable` |
//! | transport error / timeout / bad JSON | `CatalogError::Unavailable` |

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use tillpoint_core::ProductId;

use crate::client::{CatalogClient, CatalogError, DEFAULT_MAX_CONCURRENT_LOOKUPS};
use crate::snapshot::ProductSnapshot;

/// Fixed per-lookup timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<ProductSnapshot>,
}

/// Catalog client talking to the product service over HTTP.
///
/// No retries: a failed lookup is surfaced immediately.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    base_url: String,
    client: reqwest::Client,
    max_concurrent_lookups: usize,
}

impl HttpCatalogClient {
    /// Build a client for `base_url` (e.g. `http://product-service:8081`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            client,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        })
    }

    pub fn with_max_concurrent_lookups(mut self, limit: usize) -> Self {
        self.max_concurrent_lookups = limit.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn product_url(&self, product_id: ProductId) -> String {
        format!("{}/api/products/{}", self.base_url, product_id)
    }
}

#[async_trait::async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_one(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError> {
        let url = self.product_url(product_id);
        tracing::debug!(%url, "catalog lookup");

        let resp = self.client.get(&url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("product service timed out: {e}")
            } else {
                format!("failed to call product service: {e}")
            };
            CatalogError::unavailable(product_id, reason)
        })?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(CatalogError::NotFound(product_id)),
            status => {
                return Err(CatalogError::unavailable(
                    product_id,
                    format!("product service returned status {}", status.as_u16()),
                ));
            }
        }

        let envelope: CatalogEnvelope = resp.json().await.map_err(|e| {
            CatalogError::unavailable(product_id, format!("failed to decode response: {e}"))
        })?;

        if !envelope.success {
            return Err(CatalogError::unavailable(
                product_id,
                format!("product service error: {}", envelope.message),
            ));
        }

        let snapshot = envelope.data.ok_or_else(|| {
            CatalogError::unavailable(product_id, "product service returned no data")
        })?;

        if snapshot.id != product_id {
            return Err(CatalogError::unavailable(
                product_id,
                format!("product service answered for product {}", snapshot.id),
            ));
        }

        Ok(snapshot)
    }

    fn max_concurrent_lookups(&self) -> usize {
        self.max_concurrent_lookups
    }
}
