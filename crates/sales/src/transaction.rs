use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::money::{self, Money};
use tillpoint_core::{DomainError, ProductId, TransactionId, TransactionItemId};

/// One requested line of a sale, as submitted by the caller.
///
/// Raw values are kept unvalidated here; `validate_lines` turns them into
/// `ValidatedLine`s. Missing fields deserialize as zero and are rejected by
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// A line that passed input validation (positive product id and quantity).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl ValidatedLine {
    /// Capture the price for this line at the moment of sale.
    ///
    /// Fails if `unit_price × quantity` does not fit a monetary amount.
    pub fn priced(
        self,
        product_name: impl Into<String>,
        unit_price: Money,
    ) -> Result<NewTransactionItem, DomainError> {
        let subtotal = money::line_subtotal(unit_price, self.quantity).ok_or_else(|| {
            DomainError::validation(format!(
                "subtotal for product {} is out of range (price {unit_price}, quantity {})",
                self.product_id, self.quantity
            ))
        })?;
        Ok(NewTransactionItem {
            product_id: self.product_id,
            product_name: product_name.into(),
            price: unit_price,
            quantity: self.quantity,
            subtotal,
        })
    }
}

/// Validate a create request's lines, preserving caller order.
pub fn validate_lines(lines: &[LineRequest]) -> Result<Vec<ValidatedLine>, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "transaction must have at least one item",
        ));
    }

    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            if line.product_id == 0 {
                return Err(DomainError::validation(format!(
                    "items[{idx}]: product ID is required"
                )));
            }
            let product_id = ProductId::try_new(line.product_id)
                .map_err(|e| DomainError::validation(format!("items[{idx}]: {e}")))?;
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "items[{idx}]: quantity must be greater than 0"
                )));
            }
            Ok(ValidatedLine {
                product_id,
                quantity: line.quantity,
            })
        })
        .collect()
}

/// A priced line ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransactionItem {
    pub product_id: ProductId,
    pub product_name: String,
    /// Unit price captured at creation time.
    pub price: Money,
    pub quantity: i32,
    pub subtotal: Money,
}

/// A transaction header plus its priced lines, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    transaction_date: DateTime<Utc>,
    total_amount: Money,
    items: Vec<NewTransactionItem>,
}

impl NewTransaction {
    /// Build a transaction from priced items; the total is derived, never supplied.
    pub fn new(
        transaction_date: DateTime<Utc>,
        items: Vec<NewTransactionItem>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::validation(
                "transaction must have at least one item",
            ));
        }
        for item in &items {
            if item.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for product {} must be greater than 0",
                    item.product_id
                )));
            }
            if money::line_subtotal(item.price, item.quantity) != Some(item.subtotal) {
                return Err(DomainError::invariant(format!(
                    "subtotal for product {} does not equal price × quantity",
                    item.product_id
                )));
            }
        }

        let total_amount = money::checked_sum(items.iter().map(|i| i.subtotal))
            .ok_or_else(|| DomainError::validation("transaction total is out of range"))?;
        Ok(Self {
            transaction_date,
            total_amount,
            items,
        })
    }

    pub fn transaction_date(&self) -> DateTime<Utc> {
        self.transaction_date
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn items(&self) -> &[NewTransactionItem] {
        &self.items
    }

    /// Requested stock decrements, one per line, in caller order.
    pub fn stock_demand(&self) -> impl Iterator<Item = (ProductId, i32)> + '_ {
        self.items.iter().map(|i| (i.product_id, i.quantity))
    }
}

/// A persisted line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub id: TransactionItemId,
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    /// Product name captured at creation time.
    pub product_name: String,
    /// Unit price captured at creation time.
    pub price: Money,
    pub quantity: i32,
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted sales transaction (header + items in creation order).
///
/// Immutable after creation except for the soft-delete marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub transaction_date: DateTime<Utc>,
    pub total_amount: Money,
    pub items: Vec<TransactionItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Sum of the stored item subtotals, `None` on overflow.
    pub fn items_total(&self) -> Option<Money> {
        money::checked_sum(self.items.iter().map(|i| i.subtotal))
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i64::from(i.quantity)).sum()
    }

    /// Check `total_amount == Σ item.subtotal`.
    pub fn ensure_balanced(&self) -> Result<(), DomainError> {
        match self.items_total() {
            Some(items_total) if items_total == self.total_amount => {}
            Some(items_total) => {
                return Err(DomainError::invariant(format!(
                    "transaction {} total {} does not match item subtotals {}",
                    self.id, self.total_amount, items_total
                )));
            }
            None => {
                return Err(DomainError::invariant(format!(
                    "transaction {} item subtotals overflow",
                    self.id
                )));
            }
        }
        Ok(())
    }
}
