//! Denormalized transaction views returned to callers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_catalog::ProductSnapshot;
use tillpoint_core::money::{self, Money};
use tillpoint_core::{ProductId, TransactionId, TransactionItemId};
use tillpoint_sales::{Transaction, TransactionItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItemView {
    pub id: TransactionItemId,
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Money,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Money,
    /// `false` when the catalog could not supply the product and the name and
    /// price are fallbacks.
    pub product_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: TransactionId,
    pub transaction_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Money,
    pub items: Vec<TransactionItemView>,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn placeholder_name(product_id: ProductId) -> String {
    format!("Product #{product_id} (unavailable)")
}

impl TransactionView {
    /// View using the name and price captured at creation.
    pub fn captured(transaction: Transaction) -> Self {
        let items = transaction
            .items
            .into_iter()
            .map(|item| TransactionItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: item.product_name,
                price: item.price,
                quantity: item.quantity,
                subtotal: item.subtotal,
                product_available: true,
            })
            .collect();

        Self {
            id: transaction.id,
            transaction_date: transaction.transaction_date,
            total_amount: transaction.total_amount,
            items,
            created_at: transaction.created_at,
        }
    }

    /// View using live catalog data where available.
    ///
    /// Items whose product is missing from `live` get a placeholder name and a
    /// unit price recovered from the stored subtotal. Subtotals and the total
    /// always come from storage.
    pub fn enriched(transaction: Transaction, live: &HashMap<ProductId, ProductSnapshot>) -> Self {
        let items = transaction
            .items
            .into_iter()
            .map(|item| {
                let product = live.get(&item.product_id);
                enrich_item(item, product)
            })
            .collect();

        Self {
            id: transaction.id,
            transaction_date: transaction.transaction_date,
            total_amount: transaction.total_amount,
            items,
            created_at: transaction.created_at,
        }
    }
}

fn enrich_item(item: TransactionItem, live: Option<&ProductSnapshot>) -> TransactionItemView {
    let (product_name, price, product_available) = match live {
        Some(product) => (product.name.clone(), product.price, true),
        None => (
            placeholder_name(item.product_id),
            money::unit_price_from_subtotal(item.subtotal, item.quantity).unwrap_or(item.price),
            false,
        ),
    };

    TransactionItemView {
        id: item.id,
        product_id: item.product_id,
        product_name,
        price,
        quantity: item.quantity,
        subtotal: item.subtotal,
        product_available,
    }
}
