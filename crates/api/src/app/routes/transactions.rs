use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};

use crate::app::dto::{self, CreateTransactionRequest, ListTransactionsParams, TransactionListResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/:id", get(get_transaction).delete(delete_transaction))
}

pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::validation_error(format!("invalid request body: {}", e.body_text())),
    };

    match services.transactions.create_transaction(&body.items).await {
        Ok(view) => dto::success(StatusCode::CREATED, "Transaction created successfully", view),
        Err(e) => errors::transaction_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<ListTransactionsParams>,
) -> axum::response::Response {
    match services.transactions.list_transactions(params.into_query()).await {
        Ok(page) => dto::success(
            StatusCode::OK,
            "Transactions retrieved successfully",
            TransactionListResponse::from(page),
        ),
        Err(e) => errors::transaction_error_to_response(e),
    }
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_transaction_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.transactions.get_transaction(id).await {
        Ok(view) => dto::success(StatusCode::OK, "Transaction retrieved successfully", view),
        Err(e) => errors::transaction_error_to_response(e),
    }
}

pub async fn delete_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_transaction_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.transactions.delete_transaction(id).await {
        Ok(()) => dto::success(
            StatusCode::OK,
            "Transaction deleted successfully",
            serde_json::json!({ "id": id }),
        ),
        Err(e) => errors::transaction_error_to_response(e),
    }
}
