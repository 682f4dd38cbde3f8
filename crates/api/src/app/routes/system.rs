use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode};
use serde_json::json;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub async fn health() -> axum::response::Response {
    dto::success(
        StatusCode::OK,
        "Transaction service is running",
        json!({ "status": "ok" }),
    )
}

pub async fn health_db(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.transactions.ping_storage().await {
        Ok(()) => dto::success(StatusCode::OK, "Storage is reachable", json!({ "status": "ok" })),
        Err(e) => errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unavailable",
            e.to_string(),
        ),
    }
}
