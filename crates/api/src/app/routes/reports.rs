use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
};

use crate::app::dto::{self, ReportParams};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/transactions", get(transaction_summaries))
        .route("/products", get(product_sales))
        .route("/low-stock", get(low_stock))
        .route("/dashboard", get(dashboard))
}

pub async fn transaction_summaries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<ReportParams>,
) -> axum::response::Response {
    let filter = match params.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services.reports.transaction_summaries(filter).await {
        Ok(rows) => dto::success(StatusCode::OK, "Transaction summary retrieved successfully", rows),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn product_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<ReportParams>,
) -> axum::response::Response {
    let filter = match params.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services.reports.product_sales(filter).await {
        Ok(rows) => dto::success(StatusCode::OK, "Product sales report retrieved successfully", rows),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn low_stock(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.reports.low_stock().await {
        Ok(rows) => dto::success(StatusCode::OK, "Low stock alerts retrieved successfully", rows),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn dashboard(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.reports.dashboard().await {
        Ok(summary) => dto::success(StatusCode::OK, "Dashboard summary retrieved successfully", summary),
        Err(e) => errors::store_error_to_response(e),
    }
}
