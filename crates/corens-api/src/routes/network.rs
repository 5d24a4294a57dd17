//! Network status and switch endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use corens_session::NetworkStatus;

use crate::routes::{error_response, ApiResult};
use crate::AppState;

/// Create network routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_status))
        .route("/switch", post(switch))
        .route("/banner/dismiss", post(dismiss_banner))
}

/// GET /network - Active chain against the required one
pub async fn get_status(State(state): State<AppState>) -> Json<NetworkStatus> {
    Json(state.network().status().await)
}

/// POST /network/switch - Ask the wallet to move to the required chain
pub async fn switch(State(state): State<AppState>) -> ApiResult<NetworkStatus> {
    state
        .network()
        .switch_network()
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /network/banner/dismiss - Hide the wrong-network warning
pub async fn dismiss_banner(State(state): State<AppState>) -> Json<NetworkStatus> {
    Json(state.network().dismiss_banner().await)
}
