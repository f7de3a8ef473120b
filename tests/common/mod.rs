// MCP Scout -- shared integration test helpers
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;

use mcp_scout::executor::InstallExecutor;
use mcp_scout::reconcile::{HostCli, ReconcileOptions, Reconciler};
use mcp_scout::registry::{RegistryClient, RegistryCredential};
use mcp_scout::state::AppState;
use mcp_scout::store::ConfigStore;

/// Nothing listens on the discard port, so any registry call fails fast.
pub const UNREACHABLE_REGISTRY: &str = "http://127.0.0.1:9";

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join("installed.json")
}

pub fn registry(base_url: &str, key: &str) -> RegistryClient {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    RegistryClient::new(client, base_url, RegistryCredential::new(key)).unwrap()
}

/// A reconciler whose host CLI is `cli` (e.g. `true` / `false`).
pub fn scout_with(dir: &Path, cli: &str, registry_url: &str) -> Reconciler {
    Reconciler::new(
        registry(registry_url, "test-key"),
        ConfigStore::new(config_path(dir)),
        InstallExecutor::new(),
        HostCli::new(cli),
        ReconcileOptions {
            default_timeout: Duration::from_secs(10),
            cli_timeout: Duration::from_secs(5),
        },
    )
}

pub fn scout(dir: &Path, cli: &str) -> Reconciler {
    scout_with(dir, cli, UNREACHABLE_REGISTRY)
}

pub fn app_state(dir: &Path, auth_secret: Option<&str>) -> AppState {
    let state = AppState::from_reconciler(scout(dir, "true"), auth_secret.map(String::from));
    state.mark_ready();
    state
}

/// Collect a response body into a `serde_json::Value`.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
