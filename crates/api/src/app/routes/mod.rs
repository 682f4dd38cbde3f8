use axum::Router;

pub mod reports;
pub mod system;
pub mod transactions;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/transactions", transactions::router())
        .nest("/reports", reports::router())
}
