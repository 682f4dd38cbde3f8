//! Catalog lookup boundary.
//!
//! The product catalog is owned by a separate service. This crate only reads
//! from it: a strict single lookup for the create path, and a lenient batch
//! lookup for the read path.

pub mod client;
pub mod http;
pub mod in_memory;
pub mod snapshot;

pub use client::{CatalogClient, CatalogError, DEFAULT_MAX_CONCURRENT_LOOKUPS};
pub use http::{HttpCatalogClient, DEFAULT_LOOKUP_TIMEOUT};
pub use in_memory::InMemoryCatalog;
pub use snapshot::ProductSnapshot;
