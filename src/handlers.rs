// ---------------------------------------------------------------------------
// handlers.rs — Health and readiness probes for the HTTP transport
// ---------------------------------------------------------------------------

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
    pub registry_url: String,
    pub config_path: String,
    pub auth_required: bool,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.is_ready() { "ok" } else { "starting" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        app: "MCP Scout".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        registry_url: state.scout.registry().base_url().to_string(),
        config_path: state.scout.store().path().display().to_string(),
        auth_required: state.auth_secret.is_some(),
    })
}

/// GET /api/health/ready: readiness probe (no locks, no I/O).
pub async fn readiness(State(state): State<AppState>) -> axum::response::Response {
    let ready = state.is_ready();
    let uptime = state.start_time.elapsed().as_secs();
    let body = json!({ "ready": ready, "uptime_seconds": uptime });

    if ready {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}
