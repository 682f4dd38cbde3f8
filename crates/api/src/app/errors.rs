use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tillpoint_infra::{StoreError, TransactionError};

pub fn transaction_error_to_response(err: TransactionError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        TransactionError::Validation(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        TransactionError::TransactionNotFound(_) | TransactionError::ProductNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", message)
        }
        TransactionError::UpstreamUnavailable { .. } => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable", message)
        }
        TransactionError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        TransactionError::Persistence(_) => {
            tracing::error!(error = %message, "transaction request failed in storage");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", message)
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "report query failed");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "persistence_error",
        err.to_string(),
    )
}

pub fn validation_error(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "message": message.into(),
            "error": code,
        })),
    )
        .into_response()
}
