//! Read-only reporting over live (non-deleted) transactions.
//!
//! Every report is a fixed-shape record. Stores implement `ReportingStore`;
//! `ReportingService` applies default limits and composes the dashboard.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{Money, ProductId, TransactionId};

use crate::store::StoreError;

pub use postgres::PostgresReportingStore;

pub const DEFAULT_SUMMARY_LIMIT: u32 = 50;
pub const DEFAULT_PRODUCT_REPORT_LIMIT: u32 = 100;
const DASHBOARD_RECENT_TRANSACTIONS: u32 = 10;
const DASHBOARD_TOP_PRODUCTS: u32 = 5;

/// Date window and paging for report queries.
///
/// `end_date` is exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ReportFilter {
    pub fn limited(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn with_default_limit(mut self, limit: u32) -> Self {
        if self.limit.is_none_or(|l| l == 0) {
            self.limit = Some(limit);
        }
        self
    }

    pub(crate) fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_date.is_none_or(|start| at >= start) && self.end_date.is_none_or(|end| at < end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: TransactionId,
    pub transaction_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Money,
    pub total_items: i64,
    pub total_quantity: i64,
}

/// Lifetime sales of one catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSalesReport {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Money,
    pub current_stock: i32,
    pub total_sold: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    OutOfStock,
    Low,
}

impl StockStatus {
    pub fn for_stock(stock: i32) -> Self {
        if stock <= 0 { Self::OutOfStock } else { Self::Low }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Money,
    pub stock: i32,
    pub status: StockStatus,
}

/// Count and revenue over every live transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SalesTotals {
    pub transaction_count: u64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_transactions: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Money,
    pub recent_transactions: Vec<TransactionSummary>,
    pub top_products: Vec<ProductSalesReport>,
    pub low_stock_alerts: Vec<LowStockAlert>,
    pub low_stock_count: usize,
}

/// Reporting read contract.
#[async_trait::async_trait]
pub trait ReportingStore: Send + Sync {
    /// Live transactions in the window, newest first.
    async fn transaction_summaries(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<TransactionSummary>, StoreError>;

    /// Every product with its sales, best sellers first.
    async fn product_sales(&self, filter: &ReportFilter)
    -> Result<Vec<ProductSalesReport>, StoreError>;

    /// Products with `stock <= threshold`, lowest stock first.
    async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockAlert>, StoreError>;

    async fn sales_totals(&self) -> Result<SalesTotals, StoreError>;
}

#[async_trait::async_trait]
impl<S> ReportingStore for Arc<S>
where
    S: ReportingStore + ?Sized,
{
    async fn transaction_summaries(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<TransactionSummary>, StoreError> {
        (**self).transaction_summaries(filter).await
    }

    async fn product_sales(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<ProductSalesReport>, StoreError> {
        (**self).product_sales(filter).await
    }

    async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockAlert>, StoreError> {
        (**self).low_stock(threshold).await
    }

    async fn sales_totals(&self) -> Result<SalesTotals, StoreError> {
        (**self).sales_totals().await
    }
}

/// Report composition on top of a `ReportingStore`.
#[derive(Debug, Clone)]
pub struct ReportingService<R> {
    store: R,
    low_stock_threshold: i32,
}

impl<R: ReportingStore> ReportingService<R> {
    pub fn new(store: R, low_stock_threshold: i32) -> Self {
        Self {
            store,
            low_stock_threshold,
        }
    }

    pub fn low_stock_threshold(&self) -> i32 {
        self.low_stock_threshold
    }

    pub async fn transaction_summaries(
        &self,
        filter: ReportFilter,
    ) -> Result<Vec<TransactionSummary>, StoreError> {
        let filter = filter.with_default_limit(DEFAULT_SUMMARY_LIMIT);
        self.store.transaction_summaries(&filter).await
    }

    pub async fn product_sales(
        &self,
        filter: ReportFilter,
    ) -> Result<Vec<ProductSalesReport>, StoreError> {
        let filter = filter.with_default_limit(DEFAULT_PRODUCT_REPORT_LIMIT);
        self.store.product_sales(&filter).await
    }

    pub async fn low_stock(&self) -> Result<Vec<LowStockAlert>, StoreError> {
        self.store.low_stock(self.low_stock_threshold).await
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, StoreError> {
        let recent_transactions = self
            .store
            .transaction_summaries(&ReportFilter::limited(DASHBOARD_RECENT_TRANSACTIONS))
            .await?;
        let top_products = self
            .store
            .product_sales(&ReportFilter::limited(DASHBOARD_TOP_PRODUCTS))
            .await?;
        let low_stock_alerts = self.low_stock().await?;
        let totals = self.store.sales_totals().await?;

        Ok(DashboardSummary {
            total_transactions: totals.transaction_count,
            total_revenue: totals.revenue,
            recent_transactions,
            top_products,
            low_stock_count: low_stock_alerts.len(),
            low_stock_alerts,
        })
    }
}
