//! Service wiring: catalog client, stores and the services on top of them.

use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;

use tillpoint_catalog::{CatalogClient, HttpCatalogClient, InMemoryCatalog, ProductSnapshot};
use tillpoint_core::ProductId;
use tillpoint_infra::reporting::ReportingStore;
use tillpoint_infra::{
    AppConfig, InMemoryTransactionStore, PostgresReportingStore, PostgresTransactionStore,
    ReportingService, TransactionService, TransactionStore, db,
};

pub type Transactions = TransactionService<Arc<dyn CatalogClient>, Arc<dyn TransactionStore>>;
pub type Reports = ReportingService<Arc<dyn ReportingStore>>;

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub transactions: Transactions,
    pub reports: Reports,
}

impl AppServices {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        store: Arc<dyn TransactionStore>,
        reporting: Arc<dyn ReportingStore>,
        low_stock_threshold: i32,
    ) -> Self {
        Self {
            transactions: TransactionService::new(catalog, store),
            reports: ReportingService::new(reporting, low_stock_threshold),
        }
    }

    /// In-memory stores whose stock table is `catalog`.
    pub fn in_memory(
        catalog: Arc<dyn CatalogClient>,
        stock: Arc<InMemoryCatalog>,
        low_stock_threshold: i32,
    ) -> Self {
        let store = Arc::new(InMemoryTransactionStore::new(stock));
        Self::new(catalog, store.clone(), store, low_stock_threshold)
    }
}

/// Build services from configuration.
///
/// With a database, lookups go to the product service and stock is
/// decremented in Postgres. Without one, both lookups and stock come from a
/// small in-memory demo catalog.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let Some(database) = &config.database else {
        tracing::warn!("running with in-memory storage and demo catalog; data is not persisted");
        let catalog = Arc::new(demo_catalog());
        return Ok(AppServices::in_memory(
            catalog.clone(),
            catalog,
            config.low_stock_threshold,
        ));
    };

    let catalog = HttpCatalogClient::new(config.catalog.base_url.clone(), config.catalog.timeout)
        .context("failed to build product service client")?
        .with_max_concurrent_lookups(config.catalog.max_concurrent_lookups);
    tracing::info!(base_url = catalog.base_url(), "product service client ready");

    let pool = db::connect(database)
        .await
        .context("failed to connect to Postgres")?;
    db::ensure_schema(&pool)
        .await
        .context("failed to apply database schema")?;
    let pool = Arc::new(pool);

    Ok(AppServices::new(
        Arc::new(catalog),
        Arc::new(PostgresTransactionStore::from_shared(pool.clone())),
        Arc::new(PostgresReportingStore::from_shared(pool)),
        config.low_stock_threshold,
    ))
}

fn demo_catalog() -> InMemoryCatalog {
    InMemoryCatalog::with_products([
        ProductSnapshot {
            id: ProductId::new(1),
            name: "Notebook A5".to_string(),
            price: Decimal::new(1_000, 2),
            stock: 50,
        },
        ProductSnapshot {
            id: ProductId::new(2),
            name: "Ballpoint Pen".to_string(),
            price: Decimal::new(500, 2),
            stock: 100,
        },
        ProductSnapshot {
            id: ProductId::new(3),
            name: "Desk Lamp".to_string(),
            price: Decimal::new(12_500, 2),
            stock: 5,
        },
    ])
}
