// MCP Scout -- health endpoint integration test

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{app_state, body_json};
use mcp_scout::state::AppState;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = mcp_scout::create_router(app_state(dir.path(), None));

    let response = app.oneshot(get("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_endpoint_returns_json_with_status_field() {
    let dir = tempfile::tempdir().unwrap();
    let app = mcp_scout::create_router(app_state(dir.path(), None));

    let json = body_json(app.oneshot(get("/api/health")).await.unwrap()).await;

    assert_eq!(json["status"], "ok");
    assert_eq!(json["app"], "MCP Scout");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["uptime_seconds"].is_u64());
    assert!(json["config_path"].as_str().unwrap().ends_with("installed.json"));
    assert_eq!(json["auth_required"], false);
}

#[tokio::test]
async fn health_is_public_even_with_auth_secret() {
    let dir = tempfile::tempdir().unwrap();
    let app = mcp_scout::create_router(app_state(dir.path(), Some("s3cret")));

    let response = app.oneshot(get("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["auth_required"], true);
}

#[tokio::test]
async fn readiness_reflects_startup_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::from_reconciler(common::scout(dir.path(), "true"), None);

    let app = mcp_scout::create_router(state.clone());
    let response = app.oneshot(get("/api/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["ready"], false);

    state.mark_ready();
    let app = mcp_scout::create_router(state);
    let response = app.oneshot(get("/api/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = mcp_scout::create_router(app_state(dir.path(), None));

    let response = app.oneshot(get("/nonexistent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
