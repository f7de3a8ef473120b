pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod mcp;
pub mod reconcile;
pub mod registry;
pub mod state;
pub mod store;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    let mcp = Router::new()
        .route("/mcp", post(mcp::server::mcp_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        // Health (public)
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        // MCP JSON-RPC (bearer auth when AUTH_SECRET is set)
        .merge(mcp)
        .with_state(state)
}
