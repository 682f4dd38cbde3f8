use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::instrument;

use tillpoint_core::{ProductId, TransactionId};

use super::{
    LowStockAlert, ProductSalesReport, ReportFilter, ReportingStore, SalesTotals, StockStatus,
    TransactionSummary,
};
use crate::store::StoreError;
use crate::store::postgres::map_sqlx_error;

/// Reporting queries over the transaction tables and the product stock table.
#[derive(Debug, Clone)]
pub struct PostgresReportingStore {
    pool: Arc<PgPool>,
}

impl PostgresReportingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn from_shared(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>, what: &str) -> Result<T, StoreError> {
    result.map_err(|e| StoreError::Storage(format!("failed to decode {what}: {e}")))
}

#[async_trait::async_trait]
impl ReportingStore for PostgresReportingStore {
    #[instrument(skip(self), err)]
    async fn transaction_summaries(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<TransactionSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                t.id,
                t.transaction_date,
                t.total_amount,
                COUNT(i.id) AS total_items,
                COALESCE(SUM(i.quantity), 0)::BIGINT AS total_quantity
            FROM transactions t
            LEFT JOIN transaction_items i ON i.transaction_id = t.id
            WHERE t.deleted_at IS NULL
              AND ($1::timestamptz IS NULL OR t.transaction_date >= $1)
              AND ($2::timestamptz IS NULL OR t.transaction_date < $2)
            GROUP BY t.id
            ORDER BY t.transaction_date DESC, t.id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.limit.map(i64::from))
        .bind(i64::from(filter.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transaction_summaries", e))?;

        rows.iter()
            .map(|row| {
                Ok(TransactionSummary {
                    id: TransactionId::new(decode(row.try_get("id"), "summary id")?),
                    transaction_date: decode(row.try_get("transaction_date"), "summary date")?,
                    total_amount: decode(row.try_get("total_amount"), "summary total")?,
                    total_items: decode(row.try_get("total_items"), "summary item count")?,
                    total_quantity: decode(row.try_get("total_quantity"), "summary quantity")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn product_sales(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<ProductSalesReport>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                p.id,
                p.name AS product_name,
                p.price AS current_price,
                p.stock AS current_stock,
                COALESCE(SUM(i.quantity) FILTER (WHERE t.id IS NOT NULL), 0)::BIGINT AS total_sold,
                COALESCE(SUM(i.subtotal) FILTER (WHERE t.id IS NOT NULL), 0) AS total_revenue
            FROM products p
            LEFT JOIN transaction_items i ON i.product_id = p.id
            LEFT JOIN transactions t ON t.id = i.transaction_id AND t.deleted_at IS NULL
            WHERE p.deleted_at IS NULL
            GROUP BY p.id
            ORDER BY total_sold DESC, p.id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(filter.limit.map(i64::from))
        .bind(i64::from(filter.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_sales", e))?;

        rows.iter()
            .map(|row| {
                Ok(ProductSalesReport {
                    product_id: ProductId::new(decode(row.try_get("id"), "product id")?),
                    product_name: decode(row.try_get("product_name"), "product name")?,
                    current_price: decode(row.try_get("current_price"), "product price")?,
                    current_stock: decode(row.try_get("current_stock"), "product stock")?,
                    total_sold: decode(row.try_get("total_sold"), "units sold")?,
                    total_revenue: decode(row.try_get("total_revenue"), "revenue")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockAlert>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, price, stock
            FROM products
            WHERE stock <= $1 AND deleted_at IS NULL
            ORDER BY stock ASC, id ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock", e))?;

        rows.iter()
            .map(|row| {
                let stock: i32 = decode(row.try_get("stock"), "stock")?;
                Ok(LowStockAlert {
                    product_id: ProductId::new(decode(row.try_get("id"), "product id")?),
                    name: decode(row.try_get("name"), "product name")?,
                    price: decode(row.try_get("price"), "product price")?,
                    stock,
                    status: StockStatus::for_stock(stock),
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn sales_totals(&self) -> Result<SalesTotals, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS transaction_count, COALESCE(SUM(total_amount), 0) AS revenue
            FROM transactions
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sales_totals", e))?;

        let count: i64 = decode(row.try_get("transaction_count"), "transaction count")?;
        let revenue: Decimal = decode(row.try_get("revenue"), "revenue")?;
        Ok(SalesTotals {
            transaction_count: u64::try_from(count).unwrap_or(0),
            revenue,
        })
    }
}
