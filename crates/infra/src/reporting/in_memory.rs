use std::collections::HashMap;

use rust_decimal::Decimal;

use tillpoint_core::{ProductId, money};

use super::{
    LowStockAlert, ProductSalesReport, ReportFilter, ReportingStore, SalesTotals, StockStatus,
    TransactionSummary,
};
use crate::store::{InMemoryTransactionStore, StoreError};

fn page<T>(rows: Vec<T>, filter: &ReportFilter) -> Vec<T> {
    let take = filter.limit.map_or(usize::MAX, |l| l as usize);
    rows.into_iter().skip(filter.offset as usize).take(take).collect()
}

#[async_trait::async_trait]
impl ReportingStore for InMemoryTransactionStore {
    async fn transaction_summaries(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<TransactionSummary>, StoreError> {
        let mut rows: Vec<TransactionSummary> = self
            .live_transactions()?
            .into_iter()
            .filter(|t| filter.contains(t.transaction_date))
            .map(|t| TransactionSummary {
                id: t.id,
                transaction_date: t.transaction_date,
                total_amount: t.total_amount,
                total_items: t.items.len() as i64,
                total_quantity: t.total_quantity(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(page(rows, filter))
    }

    async fn product_sales(
        &self,
        filter: &ReportFilter,
    ) -> Result<Vec<ProductSalesReport>, StoreError> {
        let mut sold: HashMap<ProductId, (i64, Decimal)> = HashMap::new();
        for transaction in self.live_transactions()? {
            for item in &transaction.items {
                let entry = sold.entry(item.product_id).or_default();
                entry.0 += i64::from(item.quantity);
                entry.1 = entry.1.checked_add(item.subtotal).ok_or_else(|| {
                    StoreError::Storage(format!("revenue for product {} overflows", item.product_id))
                })?;
            }
        }

        let mut rows: Vec<ProductSalesReport> = self
            .stock_table()
            .list()
            .into_iter()
            .map(|p| {
                let (total_sold, total_revenue) = sold.get(&p.id).copied().unwrap_or_default();
                ProductSalesReport {
                    product_id: p.id,
                    product_name: p.name,
                    current_price: p.price,
                    current_stock: p.stock,
                    total_sold,
                    total_revenue,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_sold
                .cmp(&a.total_sold)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        Ok(page(rows, filter))
    }

    async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockAlert>, StoreError> {
        let mut rows: Vec<LowStockAlert> = self
            .stock_table()
            .list()
            .into_iter()
            .filter(|p| p.stock <= threshold)
            .map(|p| LowStockAlert {
                product_id: p.id,
                name: p.name,
                price: p.price,
                stock: p.stock,
                status: StockStatus::for_stock(p.stock),
            })
            .collect();
        rows.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.product_id.cmp(&b.product_id)));
        Ok(rows)
    }

    async fn sales_totals(&self) -> Result<SalesTotals, StoreError> {
        let live = self.live_transactions()?;
        Ok(SalesTotals {
            transaction_count: live.len() as u64,
            revenue: money::checked_sum(live.iter().map(|t| t.total_amount))
                .ok_or_else(|| StoreError::Storage("sales revenue overflows".to_string()))?,
        })
    }
}
