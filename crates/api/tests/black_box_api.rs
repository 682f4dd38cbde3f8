use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::{Path, State}, http::StatusCode as AxumStatus, response::IntoResponse, routing::get};
use reqwest::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use tillpoint_api::app::{self, AppServices};
use tillpoint_catalog::{CatalogClient, CatalogError, HttpCatalogClient, InMemoryCatalog, ProductSnapshot};
use tillpoint_core::ProductId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    /// Transaction service over in-memory storage; lookups and stock share
    /// `catalog`.
    async fn in_memory(catalog: Arc<InMemoryCatalog>) -> Self {
        let services = AppServices::in_memory(catalog.clone(), catalog, 10);
        Self::spawn(app::build_app(Arc::new(services))).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn seeded_catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::with_products([
        ProductSnapshot {
            id: ProductId::new(1),
            name: "Notebook".to_string(),
            price: dec!(10.00),
            stock: 10,
        },
        ProductSnapshot {
            id: ProductId::new(2),
            name: "Pencil".to_string(),
            price: dec!(5.00),
            stock: 10,
        },
    ]))
}

async fn post_items(client: &reqwest::Client, srv: &TestServer, items: Value) -> reqwest::Response {
    client
        .post(srv.url("/api/transactions"))
        .json(&json!({ "items": items }))
        .send()
        .await
        .unwrap()
}

async fn assert_error(res: reqwest::Response, status: StatusCode, code: &str) -> Value {
    assert_eq!(res.status(), status);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"].as_str().unwrap(), code);
    body
}

#[tokio::test]
async fn health_echoes_request_id() {
    let srv = TestServer::in_memory(seeded_catalog()).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());

    let res = client
        .get(srv.url("/health/db"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn create_then_read_transaction() {
    let catalog = seeded_catalog();
    let srv = TestServer::in_memory(catalog.clone()).await;
    let client = reqwest::Client::new();

    let res = post_items(
        &client,
        &srv,
        json!([{"product_id": 1, "quantity": 2}, {"product_id": 2, "quantity": 1}]),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    let data = &body["data"];
    assert_eq!(data["total_amount"].as_f64().unwrap(), 25.0);
    assert_eq!(data["items"].as_array().unwrap().len(), 2);
    assert_eq!(data["items"][0]["product_name"], "Notebook");
    assert_eq!(data["items"][0]["subtotal"].as_f64().unwrap(), 20.0);

    assert_eq!(catalog.stock_of(ProductId::new(1)), Some(8));
    assert_eq!(catalog.stock_of(ProductId::new(2)), Some(9));

    let id = data["id"].as_i64().unwrap();
    let res = client
        .get(srv.url(&format!("/api/transactions/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["id"].as_i64().unwrap(), id);
    assert_eq!(body["data"]["total_amount"].as_f64().unwrap(), 25.0);
}

#[tokio::test]
async fn invalid_requests_are_validation_errors() {
    let srv = TestServer::in_memory(seeded_catalog()).await;
    let client = reqwest::Client::new();

    assert_error(post_items(&client, &srv, json!([])).await, StatusCode::BAD_REQUEST, "validation_error").await;
    assert_error(
        post_items(&client, &srv, json!([{"product_id": 0, "quantity": 1}])).await,
        StatusCode::BAD_REQUEST,
        "validation_error",
    )
    .await;
    assert_error(
        post_items(&client, &srv, json!([{"product_id": 1}])).await,
        StatusCode::BAD_REQUEST,
        "validation_error",
    )
    .await;

    let res = client
        .post(srv.url("/api/transactions"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_error(res, StatusCode::BAD_REQUEST, "validation_error").await;

    let res = client
        .get(srv.url("/api/transactions/abc"))
        .send()
        .await
        .unwrap();
    assert_error(res, StatusCode::BAD_REQUEST, "validation_error").await;
}

#[tokio::test]
async fn business_rule_failures_map_to_distinct_statuses() {
    let catalog = seeded_catalog();
    let srv = TestServer::in_memory(catalog.clone()).await;
    let client = reqwest::Client::new();

    let body = assert_error(
        post_items(&client, &srv, json!([{"product_id": 1, "quantity": 11}])).await,
        StatusCode::CONFLICT,
        "insufficient_stock",
    )
    .await;
    assert!(body["message"].as_str().unwrap().contains("Notebook"));
    assert_eq!(catalog.stock_of(ProductId::new(1)), Some(10));

    assert_error(
        post_items(&client, &srv, json!([{"product_id": 77, "quantity": 1}])).await,
        StatusCode::NOT_FOUND,
        "not_found",
    )
    .await;

    let res = client
        .get(srv.url("/api/transactions/999"))
        .send()
        .await
        .unwrap();
    assert_error(res, StatusCode::NOT_FOUND, "not_found").await;

    catalog.set_unavailable(true);
    assert_error(
        post_items(&client, &srv, json!([{"product_id": 1, "quantity": 1}])).await,
        StatusCode::SERVICE_UNAVAILABLE,
        "upstream_unavailable",
    )
    .await;
}

#[tokio::test]
async fn list_paginates_and_delete_hides() {
    let srv = TestServer::in_memory(seeded_catalog()).await;
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for qty in 1..=3 {
        let res = post_items(&client, &srv, json!([{"product_id": 2, "quantity": qty}])).await;
        let body: Value = res.json().await.unwrap();
        ids.push(body["data"]["id"].as_i64().unwrap());
    }

    let res = client
        .get(srv.url("/api/transactions?page=1&limit=2&sort_by=id&order=asc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let page = &body["data"];
    assert_eq!(page["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(page["transactions"][0]["id"].as_i64().unwrap(), ids[0]);
    assert_eq!(page["pagination"]["total"], json!(3));
    assert_eq!(page["pagination"]["total_pages"], json!(2));
    assert_eq!(page["pagination"]["has_next"], json!(true));
    assert_eq!(page["pagination"]["has_prev"], json!(false));

    let res = client
        .delete(srv.url(&format!("/api/transactions/{}", ids[0])))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/api/transactions/{}", ids[0])))
        .send()
        .await
        .unwrap();
    assert_error(res, StatusCode::NOT_FOUND, "not_found").await;

    let body: Value = client
        .get(srv.url("/api/transactions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["pagination"]["total"], json!(2));
}

#[tokio::test]
async fn reports_reflect_committed_sales() {
    let srv = TestServer::in_memory(seeded_catalog()).await;
    let client = reqwest::Client::new();

    post_items(&client, &srv, json!([{"product_id": 1, "quantity": 4}])).await;
    post_items(&client, &srv, json!([{"product_id": 2, "quantity": 2}])).await;

    let body: Value = client
        .get(srv.url("/api/reports/dashboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let dashboard = &body["data"];
    assert_eq!(dashboard["total_transactions"], json!(2));
    assert_eq!(dashboard["total_revenue"].as_f64().unwrap(), 50.0);
    assert_eq!(dashboard["top_products"][0]["product_id"], json!(1));
    // Notebook 6 left, Pencil 8 left: both at or under the threshold of 10.
    assert_eq!(dashboard["low_stock_count"], json!(2));
    assert_eq!(dashboard["low_stock_alerts"][0]["status"], "LOW");

    let res = client
        .get(srv.url("/api/reports/transactions?start_date=2000-01-01&limit=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let res = client
        .get(srv.url("/api/reports/transactions?end_date=yesterday"))
        .send()
        .await
        .unwrap();
    assert_error(res, StatusCode::BAD_REQUEST, "validation_error").await;

    let res = client.get(srv.url("/api/reports/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client.get(srv.url("/api/reports/low-stock")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn catalog_product(
    State(catalog): State<Arc<InMemoryCatalog>>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match catalog.fetch_one(ProductId::new(id)).await {
        Ok(p) => Json(json!({"success": true, "message": "ok", "data": p})).into_response(),
        Err(CatalogError::NotFound(_)) => (
            AxumStatus::NOT_FOUND,
            Json(json!({"success": false, "message": "product not found"})),
        )
            .into_response(),
        Err(e) => (
            AxumStatus::SERVICE_UNAVAILABLE,
            Json(json!({"success": false, "message": e.to_string()})),
        )
            .into_response(),
    }
}

#[tokio::test]
async fn remote_catalog_prices_sales_and_outage_degrades_reads() {
    let stock = seeded_catalog();
    let catalog_app = Router::new()
        .route("/api/products/:id", get(catalog_product))
        .with_state(stock.clone());
    let catalog_srv = TestServer::spawn(catalog_app).await;

    let remote: Arc<dyn CatalogClient> = Arc::new(
        HttpCatalogClient::new(catalog_srv.base_url.clone(), Duration::from_secs(5)).unwrap(),
    );
    let services = AppServices::in_memory(remote, stock.clone(), 10);
    let srv = TestServer::spawn(app::build_app(Arc::new(services))).await;
    let client = reqwest::Client::new();

    let res = post_items(&client, &srv, json!([{"product_id": 1, "quantity": 3}])).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(stock.stock_of(ProductId::new(1)), Some(7));

    // Catalog outage: reads still succeed with fallbacks.
    stock.set_unavailable(true);

    let res = client
        .get(srv.url(&format!("/api/transactions/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let item = &body["data"]["items"][0];
    assert_eq!(item["product_name"], "Product #1 (unavailable)");
    assert_eq!(item["price"].as_f64().unwrap(), 10.0);
    assert_eq!(item["product_available"], json!(false));
    assert_eq!(body["data"]["total_amount"].as_f64().unwrap(), 30.0);

    assert_error(
        post_items(&client, &srv, json!([{"product_id": 1, "quantity": 1}])).await,
        StatusCode::SERVICE_UNAVAILABLE,
        "upstream_unavailable",
    )
    .await;
}
