//! Wallet session endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use corens_core::short_address;

use crate::dto::WalletResponse;
use crate::routes::{error_response, ApiResult};
use crate::AppState;

/// Create wallet routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wallet))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
}

async fn wallet_response(state: &AppState) -> WalletResponse {
    let session = state.session();
    let snapshot = session.snapshot();
    let short = session.address().await.map(|a| short_address(&a));

    WalletResponse {
        connected: snapshot.connected,
        address: snapshot.address,
        short_address: short,
        chain_id: snapshot.chain_id,
        provider_available: session.has_provider(),
    }
}

/// GET /wallet - Current session
pub async fn get_wallet(State(state): State<AppState>) -> Json<WalletResponse> {
    Json(wallet_response(&state).await)
}

/// POST /wallet/connect - Request account access from the wallet
pub async fn connect(State(state): State<AppState>) -> ApiResult<WalletResponse> {
    state.session().connect().await.map_err(error_response)?;
    Ok(Json(wallet_response(&state).await))
}

/// POST /wallet/disconnect - End the session and forget it
pub async fn disconnect(State(state): State<AppState>) -> Json<WalletResponse> {
    state.session().disconnect().await;
    Json(wallet_response(&state).await)
}
