//! Health check endpoint

use axum::{extract::State, Json};

use crate::dto::HealthResponse;
use crate::AppState;

/// GET /health - Check API health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(
        state.config().chain.chain_id,
        state.session().has_provider(),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::routes::test_support::app;

    #[tokio::test]
    async fn test_health() {
        let app = app(1114);
        let (status, body) = app.call(Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["chain_id"], 1114);
        assert_eq!(body["wallet_provider"], true);
    }
}
