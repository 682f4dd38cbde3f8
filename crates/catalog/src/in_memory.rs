use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tillpoint_core::ProductId;

use crate::client::{CatalogClient, CatalogError};
use crate::snapshot::ProductSnapshot;

/// In-memory product catalog.
///
/// Intended for tests/dev. It doubles as the shared stock table that the
/// in-memory transaction store decrements, so that stock changes made by a
/// committed sale are visible to subsequent lookups.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<BTreeMap<ProductId, ProductSnapshot>>,
    unavailable: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        let catalog = Self::new();
        for p in products {
            catalog.upsert(p);
        }
        catalog
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ProductId, ProductSnapshot>> {
        self.products.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ProductId, ProductSnapshot>> {
        self.products.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn upsert(&self, product: ProductSnapshot) {
        self.write().insert(product.id, product);
    }

    /// Remove a product, as if the catalog deleted it.
    pub fn remove(&self, product_id: ProductId) -> Option<ProductSnapshot> {
        self.write().remove(&product_id)
    }

    /// Simulate the catalog service being unreachable.
    ///
    /// Only lookups are affected; the stock table stays writable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get(&self, product_id: ProductId) -> Option<ProductSnapshot> {
        self.read().get(&product_id).cloned()
    }

    pub fn stock_of(&self, product_id: ProductId) -> Option<i32> {
        self.read().get(&product_id).map(|p| p.stock)
    }

    /// All products, ordered by id.
    pub fn list(&self) -> Vec<ProductSnapshot> {
        self.read().values().cloned().collect()
    }

    /// Apply a set of conditional stock decrements as one atomic step.
    ///
    /// Decrements are evaluated in order against a working copy; each one only
    /// succeeds if the remaining stock covers it. On the first shortfall (or a
    /// missing product) nothing is applied and the offending product id is
    /// returned.
    pub fn try_decrement_all(&self, demand: &[(ProductId, i32)]) -> Result<(), ProductId> {
        let mut products = self.write();

        let mut remaining: HashMap<ProductId, i32> = HashMap::new();
        for &(product_id, quantity) in demand {
            let current = match remaining.get(&product_id) {
                Some(stock) => *stock,
                None => match products.get(&product_id) {
                    Some(p) => p.stock,
                    None => return Err(product_id),
                },
            };
            if quantity <= 0 || current < quantity {
                return Err(product_id);
            }
            remaining.insert(product_id, current - quantity);
        }

        for (product_id, stock) in remaining {
            if let Some(p) = products.get_mut(&product_id) {
                p.stock = stock;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn fetch_one(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::unavailable(
                product_id,
                "catalog marked unavailable",
            ));
        }
        self.get(product_id)
            .ok_or(CatalogError::NotFound(product_id))
    }
}
