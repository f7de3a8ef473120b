// MCP Scout -- state
// Application state shared by the HTTP and stdio transports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;

use crate::config::Settings;
use crate::error::{ScoutError, ScoutResult};
use crate::executor::InstallExecutor;
use crate::reconcile::{HostCli, ReconcileOptions, Reconciler};
use crate::registry::RegistryClient;
use crate::store::ConfigStore;

/// Central application state. Cheap to clone; shared parts live behind Arc.
#[derive(Clone)]
pub struct AppState {
    pub scout: Arc<Reconciler>,
    pub start_time: Instant,
    /// `true` once startup has finished.
    pub ready: Arc<AtomicBool>,
    /// Optional auth secret from AUTH_SECRET env. None = dev mode (no auth).
    pub auth_secret: Option<String>,
}

impl AppState {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("MCP Scout marked as READY");
    }
}

impl AppState {
    pub fn new(settings: &Settings) -> ScoutResult<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ScoutError::Internal(format!("failed to build HTTP client: {}", e)))?;

        let registry = RegistryClient::new(client, &settings.registry_url, settings.credential.clone())?;
        let store = ConfigStore::new(settings.config_path.clone());
        let scout = Reconciler::new(
            registry,
            store,
            InstallExecutor::with_stdin_reply("y\n"),
            HostCli::new(settings.host_cli.clone()),
            ReconcileOptions {
                default_timeout: settings.install_timeout,
                cli_timeout: settings.cli_timeout,
            },
        );

        if settings.auth_secret.is_some() {
            tracing::info!("AUTH_SECRET configured, /mcp requires a bearer token");
        } else {
            tracing::info!("AUTH_SECRET not set, /mcp authentication disabled");
        }

        tracing::info!(
            registry = %settings.registry_url,
            config_path = %settings.config_path.display(),
            host_cli = %settings.host_cli,
            "AppState initialised"
        );

        Ok(Self::from_reconciler(scout, settings.auth_secret.clone()))
    }

    /// Wrap an already-built reconciler (tests build theirs directly).
    pub fn from_reconciler(scout: Reconciler, auth_secret: Option<String>) -> Self {
        Self {
            scout: Arc::new(scout),
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
            auth_secret,
        }
    }
}
