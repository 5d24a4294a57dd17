//! API route handlers

pub mod domains;
pub mod health;
pub mod network;
pub mod wallet;

use axum::{http::StatusCode, routing::get, Json, Router};

use crate::dto::ApiError;
use crate::AppState;

/// Handler result carrying an error body on failure
pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// Map a domain error onto its HTTP status and error body
pub(crate) fn error_response(err: corens_core::Error) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiError::from(&err)))
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/wallet", wallet::router())
        .nest("/network", network::router())
        .nest("/domains", domains::router())
        .with_state(state)
}
