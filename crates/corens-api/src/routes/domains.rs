//! Domain search, registration and details endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use corens_registration::{lookup_domain, DomainInfo, WorkflowSnapshot};

use crate::dto::{CheckRequest, SearchInputRequest};
use crate::routes::{error_response, ApiResult};
use crate::AppState;

/// Create domain routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(get_search))
        .route("/search/input", post(edit_input))
        .route("/search/check", post(check))
        .route("/search/register", post(register))
        .route("/search/dismiss", post(dismiss))
        .route("/:name", get(get_domain))
}

/// GET /domains/search - Current workflow state
pub async fn get_search(State(state): State<AppState>) -> Json<WorkflowSnapshot> {
    Json(state.workflow().snapshot())
}

/// POST /domains/search/input - Replace the search input
pub async fn edit_input(
    State(state): State<AppState>,
    Json(request): Json<SearchInputRequest>,
) -> ApiResult<WorkflowSnapshot> {
    state
        .workflow()
        .edit_input(&request.input)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /domains/search/check - Check availability of the search input
pub async fn check(
    State(state): State<AppState>,
    request: Option<Json<CheckRequest>>,
) -> ApiResult<WorkflowSnapshot> {
    let workflow = state.workflow();
    let input = match request.and_then(|Json(r)| r.input) {
        Some(input) => input,
        None => workflow.snapshot().input,
    };

    workflow
        .check_availability(&input)
        .await
        .map_err(error_response)?;
    Ok(Json(workflow.snapshot()))
}

/// POST /domains/search/register - Register the available name.
/// Responds once the transaction is confirmed or has failed.
pub async fn register(State(state): State<AppState>) -> ApiResult<WorkflowSnapshot> {
    let workflow = state.workflow();
    workflow.register().await.map_err(error_response)?;
    Ok(Json(workflow.snapshot()))
}

/// POST /domains/search/dismiss - Return the workflow to idle
pub async fn dismiss(State(state): State<AppState>) -> ApiResult<WorkflowSnapshot> {
    state
        .workflow()
        .dismiss()
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /domains/:name - Registry record of one name
pub async fn get_domain(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<DomainInfo> {
    let suffix = &state.config().registration.suffix;
    lookup_domain(state.gateway(), &name, suffix)
        .await
        .map(Json)
        .map_err(error_response)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use corens_core::{unix_now, RegistrationRecord};
    use ethers::types::Address;
    use serde_json::json;

    use crate::routes::test_support::app;

    #[tokio::test]
    async fn test_check_available_name() {
        let app = app(1114);

        let (status, body) = app
            .call(Method::POST, "/domains/search/input", Some(json!({ "input": "Alice" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["input"], "Alice");
        assert_eq!(body["state"]["state"], "idle");

        let (status, body) = app.call(Method::POST, "/domains/search/check", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["state"], "available");
        assert_eq!(body["state"]["name"], "alice.core");
    }

    #[tokio::test]
    async fn test_check_too_long_name() {
        let app = app(1114);
        let input = "x".repeat(40);

        let (status, body) = app
            .call(Method::POST, "/domains/search/check", Some(json!({ "input": input })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "encoding_too_long");
        assert_eq!(app.contracts.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_register_requires_available() {
        let app = app(1114);
        let (status, body) = app.call(Method::POST, "/domains/search/register", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "not_available");
        assert!(app.contracts.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_register_end_to_end() {
        let app = app(1114);
        app.call(Method::POST, "/domains/search/check", Some(json!({ "input": "alice" })))
            .await;

        let (status, body) = app.call(Method::POST, "/domains/search/register", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["state"], "success");
        assert_eq!(app.wallet.account_requests(), 1);
        assert_eq!(app.contracts.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_register_on_wrong_network() {
        let app = app(1);
        app.call(Method::POST, "/wallet/connect", None).await;
        app.call(Method::POST, "/domains/search/check", Some(json!({ "input": "alice" })))
            .await;

        let (status, body) = app.call(Method::POST, "/domains/search/register", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "wrong_network");
    }

    #[tokio::test]
    async fn test_domain_details() {
        let app = app(1114);
        app.contracts.set_record(
            "bob.core",
            RegistrationRecord {
                owner: Address::from_low_u64_be(0xabc),
                resolver: Address::zero(),
                registration_time: 100,
                expiration: unix_now() + 3600,
            },
        );

        let (status, body) = app.call(Method::GET, "/domains/bob", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "bob.core");
        assert_eq!(body["status"], "active");
        assert_eq!(body["available"], false);
        assert_eq!(body["registered_at"], 100);

        let (_, body) = app.call(Method::GET, "/domains/search", None).await;
        assert_eq!(body["state"]["state"], "idle");
    }

    #[tokio::test]
    async fn test_dismiss_after_taken() {
        let app = app(1114);
        app.contracts.set_record(
            "bob.core",
            RegistrationRecord {
                owner: Address::from_low_u64_be(0xabc),
                resolver: Address::zero(),
                registration_time: 100,
                expiration: unix_now() + 3600,
            },
        );
        let (_, body) = app
            .call(Method::POST, "/domains/search/check", Some(json!({ "input": "bob" })))
            .await;
        assert_eq!(body["state"]["state"], "taken");

        let (status, body) = app.call(Method::POST, "/domains/search/dismiss", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["state"], "idle");
    }
}
