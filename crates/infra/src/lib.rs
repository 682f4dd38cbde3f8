//! Infrastructure layer: storage, catalog wiring, orchestration, config.

pub mod config;
pub mod db;
pub mod reporting;
pub mod service;
pub mod store;


pub use config::{AppConfig, CatalogConfig, ConfigError, DatabaseConfig};
pub use reporting::{
    DashboardSummary, LowStockAlert, PostgresReportingStore, ProductSalesReport, ReportFilter,
    ReportingService, ReportingStore, StockStatus, TransactionSummary,
};
pub use service::{TransactionError, TransactionItemView, TransactionService, TransactionView};
pub use store::{
    InMemoryTransactionStore, ListQuery, Page, PostgresTransactionStore, SortDirection, SortKey,
    StoreError, TransactionStore,
};
