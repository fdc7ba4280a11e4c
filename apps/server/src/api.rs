//! HTTP surface.
//!
//! ## Endpoints
//! - `POST /v1/complete`: route and run a completion
//! - `GET  /v1/metrics`: aggregate metrics snapshot
//! - `GET  /v1/health`: liveness plus the active policy version
//! - `GET  /v1/bands`: the active band policy
//! - `GET  /`: service index
//! - `GET  /dashboard`: metrics dashboard page

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lattice_orchestrator::{CompletionError, CompletionOrchestrator, CompletionRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Shared state available to all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<CompletionOrchestrator>,
    pub environment: String,
}

/// Builds the application router.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/v1/complete", post(complete_handler))
        .route("/v1/metrics", get(metrics_handler))
        .route("/v1/health", get(health_handler))
        .route("/v1/bands", get(bands_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors_layer(cors_origins)))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Error response carrying the structured `{"error": {...}}` body.
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, body: err.to_json() }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let err = CompletionError::InvalidRequest(rejection.body_text());
        Self { status: StatusCode::BAD_REQUEST, body: err.to_json() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// `POST /v1/complete`
async fn complete_handler(
    State(state): State<AppState>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let response = state.orchestrator.complete(request).await?;
    Ok(Json(response).into_response())
}

/// `GET /v1/metrics`
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.metrics().snapshot())
}

/// `GET /v1/health`
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let policy = state.orchestrator.policy().snapshot();
    Json(json!({
        "status": "ok",
        "environment": state.environment,
        "policy_version": policy.version(),
    }))
}

/// `GET /v1/bands`
async fn bands_handler(State(state): State<AppState>) -> impl IntoResponse {
    let policy = state.orchestrator.policy().snapshot();
    Json(json!({
        "version": policy.version(),
        "default_band": policy.default_band(),
        "band_order": policy.band_order(),
        "aliases": policy.aliases(),
        "bands": policy.bands(),
        "providers": state.orchestrator.providers().names(),
    }))
}

async fn index_handler() -> impl IntoResponse {
    Json(json!({
        "service": "lattice",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/v1/complete", "/v1/metrics", "/v1/health", "/v1/bands", "/dashboard"],
    }))
}

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}
