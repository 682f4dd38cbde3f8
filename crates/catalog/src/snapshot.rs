use serde::{Deserialize, Serialize};

use tillpoint_core::{Money, ProductId};

/// Point-in-time copy of a catalog product.
///
/// Valid only at the instant it was read; never kept in sync afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Money,
    pub stock: i32,
}

impl ProductSnapshot {
    pub fn has_stock_for(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }
}
