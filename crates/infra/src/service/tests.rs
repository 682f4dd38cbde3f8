use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tillpoint_catalog::{InMemoryCatalog, ProductSnapshot};

use super::*;
use crate::store::InMemoryTransactionStore;

type TestService = TransactionService<Arc<InMemoryCatalog>, Arc<InMemoryTransactionStore>>;

struct Harness {
    catalog: Arc<InMemoryCatalog>,
    store: Arc<InMemoryTransactionStore>,
    service: TestService,
}

fn product(id: i64, name: &str, price: Decimal, stock: i32) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        name: name.to_string(),
        price,
        stock,
    }
}

fn harness(products: Vec<ProductSnapshot>) -> Harness {
    let catalog = Arc::new(InMemoryCatalog::with_products(products));
    let store = Arc::new(InMemoryTransactionStore::new(catalog.clone()));
    let service = TransactionService::new(catalog.clone(), store.clone());
    Harness {
        catalog,
        store,
        service,
    }
}

fn line(product_id: i64, quantity: i32) -> LineRequest {
    LineRequest {
        product_id,
        quantity,
    }
}

fn stock(h: &Harness, product_id: i64) -> Option<i32> {
    h.catalog.stock_of(ProductId::new(product_id))
}

/// Reports plenty of stock regardless of the real stock table, so the
/// pre-check always passes and the store has the final word.
struct StaleCatalog(Arc<InMemoryCatalog>);

#[async_trait::async_trait]
impl CatalogClient for StaleCatalog {
    async fn fetch_one(&self, product_id: ProductId) -> Result<ProductSnapshot, CatalogError> {
        let mut snapshot = self.0.fetch_one(product_id).await?;
        snapshot.stock = 1_000;
        Ok(snapshot)
    }
}

#[tokio::test]
async fn create_prices_lines_and_reduces_stock() {
    let h = harness(vec![
        product(1, "Notebook", dec!(10.00), 10),
        product(2, "Pencil", dec!(5.00), 10),
    ]);

    let view = h
        .service
        .create_transaction(&[line(1, 2), line(2, 1)])
        .await
        .unwrap();

    assert_eq!(view.total_amount, dec!(25.00));
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.items[0].product_name, "Notebook");
    assert_eq!(view.items[0].price, dec!(10.00));
    assert_eq!(view.items[0].subtotal, dec!(20.00));
    assert_eq!(view.items[1].subtotal, dec!(5.00));
    assert_eq!(stock(&h, 1), Some(8));
    assert_eq!(stock(&h, 2), Some(9));
}

#[tokio::test]
async fn quantity_above_live_stock_is_rejected_without_effects() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 3)]);

    let err = h.service.create_transaction(&[line(1, 4)]).await.unwrap_err();
    match err {
        TransactionError::InsufficientStock {
            product_id,
            available: Some(3),
            requested: 4,
            ..
        } if product_id == ProductId::new(1) => {}
        other => panic!("Expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(h.store.stored_count(), 0);
    assert_eq!(stock(&h, 1), Some(3));
}

#[tokio::test]
async fn out_of_range_catalog_price_fails_cleanly() {
    let h = harness(vec![
        product(1, "Gold bar", Decimal::MAX / dec!(2), 10),
        product(2, "Pencil", dec!(5.00), 10),
    ]);

    let err = h
        .service
        .create_transaction(&[line(2, 1), line(1, 3)])
        .await
        .unwrap_err();
    assert!(
        matches!(err, TransactionError::Validation(ref m) if m.contains("out of range")),
        "Expected Validation, got {err:?}"
    );
    assert_eq!(h.store.stored_count(), 0);
    assert_eq!(stock(&h, 1), Some(10));
    assert_eq!(stock(&h, 2), Some(10));
}

#[tokio::test]
async fn unreachable_catalog_aborts_create() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 10)]);
    h.catalog.set_unavailable(true);

    let err = h.service.create_transaction(&[line(1, 1)]).await.unwrap_err();
    assert!(matches!(err, TransactionError::UpstreamUnavailable { .. }));
    assert_eq!(h.store.stored_count(), 0);
    assert_eq!(stock(&h, 1), Some(10));
}

#[tokio::test]
async fn unknown_product_aborts_create() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 10)]);

    let err = h
        .service
        .create_transaction(&[line(1, 1), line(42, 1)])
        .await
        .unwrap_err();
    assert_eq!(err, TransactionError::ProductNotFound(ProductId::new(42)));
    assert_eq!(h.store.stored_count(), 0);
    assert_eq!(stock(&h, 1), Some(10));
}

#[tokio::test]
async fn invalid_lines_are_rejected_before_any_lookup() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 10)]);
    h.catalog.set_unavailable(true);

    for lines in [vec![], vec![line(0, 1)], vec![line(1, 0)], vec![line(1, -2)]] {
        let err = h.service.create_transaction(&lines).await.unwrap_err();
        match err {
            TransactionError::Validation(_) => {}
            other => panic!("Expected Validation for {lines:?}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn repeated_product_is_checked_against_cumulative_demand() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 5)]);

    let err = h
        .service
        .create_transaction(&[line(1, 3), line(1, 3)])
        .await
        .unwrap_err();
    match err {
        TransactionError::InsufficientStock {
            available: Some(5),
            requested: 6,
            ..
        } => {}
        other => panic!("Expected InsufficientStock on cumulative demand, got {other:?}"),
    }
    assert_eq!(stock(&h, 1), Some(5));
}

#[tokio::test]
async fn storage_shortfall_after_precheck_is_insufficient_stock() {
    let catalog = Arc::new(InMemoryCatalog::with_products([
        product(1, "Notebook", dec!(10.00), 10),
        product(2, "Pencil", dec!(5.00), 2),
    ]));
    let store = Arc::new(InMemoryTransactionStore::new(catalog.clone()));
    let service = TransactionService::new(StaleCatalog(catalog.clone()), store.clone());

    let err = service
        .create_transaction(&[line(1, 4), line(2, 3)])
        .await
        .unwrap_err();
    match err {
        TransactionError::InsufficientStock {
            product_id,
            product_name: Some(ref name),
            available: None,
            requested: 3,
        } if product_id == ProductId::new(2) && name == "Pencil" => {}
        other => panic!("Expected late InsufficientStock, got {other:?}"),
    }
    // Nothing from the aborted unit of work is visible.
    assert_eq!(store.stored_count(), 0);
    assert_eq!(catalog.stock_of(ProductId::new(1)), Some(10));
    assert_eq!(catalog.stock_of(ProductId::new(2)), Some(2));
}

#[tokio::test]
async fn storage_failure_is_a_persistence_error() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 10)]);
    h.store.set_offline(true);

    let err = h.service.create_transaction(&[line(1, 1)]).await.unwrap_err();
    assert!(matches!(err, TransactionError::Persistence(_)));
    assert_eq!(stock(&h, 1), Some(10));
    assert!(h.service.ping_storage().await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sales_never_oversell() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 5)]);
    let service = Arc::new(h.service);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create_transaction(&[line(1, 3)]).await })
        })
        .collect();

    let mut ok = 0;
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(TransactionError::InsufficientStock { .. }) => short += 1,
            Err(other) => panic!("Expected success or InsufficientStock, got {other:?}"),
        }
    }
    assert_eq!((ok, short), (1, 1));
    assert_eq!(h.catalog.stock_of(ProductId::new(1)), Some(2));
}

#[tokio::test]
async fn removed_product_still_reads_with_fallbacks() {
    let h = harness(vec![
        product(1, "Notebook", dec!(10.00), 10),
        product(2, "Pencil", dec!(5.00), 10),
    ]);
    let created = h
        .service
        .create_transaction(&[line(1, 3), line(2, 2)])
        .await
        .unwrap();

    // Price drift on one product, removal of the other.
    h.catalog.upsert(product(2, "Pencil HB", dec!(6.00), 8));
    h.catalog.remove(ProductId::new(1));

    let view = h.service.get_transaction(created.id).await.unwrap();
    assert_eq!(view.total_amount, dec!(40.00));

    let removed = &view.items[0];
    assert_eq!(removed.product_name, "Product #1 (unavailable)");
    assert_eq!(removed.price, dec!(10.00));
    assert_eq!(removed.subtotal, dec!(30.00));
    assert!(!removed.product_available);

    let live = &view.items[1];
    assert_eq!(live.product_name, "Pencil HB");
    assert_eq!(live.price, dec!(6.00));
    assert_eq!(live.subtotal, dec!(10.00));
}

#[tokio::test]
async fn list_renders_every_entry_when_catalog_is_down() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 10)]);
    for _ in 0..3 {
        h.service.create_transaction(&[line(1, 1)]).await.unwrap();
    }
    h.catalog.set_unavailable(true);

    let page = h.service.list_transactions(ListQuery::default()).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 3);
    assert!(page.items.iter().all(|t| !t.items[0].product_available));
    assert!(page.items.iter().all(|t| t.items[0].price == dec!(10.00)));
}

#[tokio::test]
async fn missing_and_deleted_transactions_are_not_found() {
    let h = harness(vec![product(1, "Notebook", dec!(10.00), 10)]);
    let created = h.service.create_transaction(&[line(1, 1)]).await.unwrap();

    h.service.delete_transaction(created.id).await.unwrap();
    assert_eq!(
        h.service.get_transaction(created.id).await,
        Err(TransactionError::TransactionNotFound(created.id))
    );
    assert_eq!(
        h.service.delete_transaction(created.id).await,
        Err(TransactionError::TransactionNotFound(created.id))
    );
    assert_eq!(
        h.service.get_transaction(TransactionId::new(999)).await,
        Err(TransactionError::TransactionNotFound(TransactionId::new(999)))
    );
}

#[test]
fn insufficient_stock_message_names_the_product() {
    let err = TransactionError::InsufficientStock {
        product_id: ProductId::new(3),
        product_name: Some("Notebook".to_string()),
        available: Some(1),
        requested: 2,
    };
    assert_eq!(
        err.to_string(),
        "insufficient stock for product 'Notebook'. Available: 1, Requested: 2"
    );
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: the total reported by a listing is the same on every page and
    /// equals the number of live transactions; pages partition the results.
    #[test]
    fn listing_total_is_page_independent(
        created in 0usize..25,
        deleted in 0usize..5,
        limit in 1i64..12,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let h = harness(vec![product(1, "Notebook", dec!(1.00), 1_000)]);
            let mut ids = Vec::new();
            for _ in 0..created {
                ids.push(h.service.create_transaction(&[line(1, 1)]).await.unwrap().id);
            }
            let deleted = deleted.min(created);
            for id in ids.iter().take(deleted) {
                h.service.delete_transaction(*id).await.unwrap();
            }
            let live = (created - deleted) as u64;

            let mut seen = 0u64;
            let mut page_no = 1i64;
            loop {
                let query = ListQuery::new(Some(page_no), Some(limit), None, None, None);
                let page = h.service.list_transactions(query).await.unwrap();
                prop_assert_eq!(page.total, live);
                if page.items.is_empty() {
                    break;
                }
                seen += page.items.len() as u64;
                page_no += 1;
            }
            prop_assert_eq!(seen, live);
            Ok(())
        })?;
    }
}
