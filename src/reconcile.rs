// MCP Scout -- reconcile
//! Install / verify / list / uninstall as short transactions against the
//! local [`ConfigStore`].
//!
//! A record is written only after the install command exits 0. The host
//! CLI's own view (`<cli> mcp get`) is consulted by `verify` but never
//! overrides the local record: the store is authoritative for what Scout
//! considers installed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::audit;
use crate::error::{ScoutError, ScoutResult};
use crate::executor::{ExecutionResult, InstallExecutor};
use crate::registry::RegistryClient;
use crate::store::{Config, ConfigStore, InstalledRecord};

/// Package the host CLI launches to run a registry server.
pub const DEFAULT_RUNNER_PACKAGE: &str = "@smithery/cli@latest";

// ── Host CLI convention ─────────────────────────────────────────────────────

/// Argument vectors for the host CLI (`claude mcp add|get|remove`).
#[derive(Debug, Clone)]
pub struct HostCli {
    pub program: String,
    pub runner_package: String,
}

impl HostCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            runner_package: DEFAULT_RUNNER_PACKAGE.to_string(),
        }
    }

    /// `[cli, mcp, add, name, (-e K=V)*, --, npx, -y, <runner>, run, id, (--config json)?]`
    pub fn add_args(
        &self,
        cli_name: &str,
        identifier: &str,
        env: &BTreeMap<String, String>,
        config: Option<&Value>,
    ) -> Vec<String> {
        let mut args = vec![
            self.program.clone(),
            "mcp".to_string(),
            "add".to_string(),
            cli_name.to_string(),
        ];
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.extend([
            "--".to_string(),
            "npx".to_string(),
            "-y".to_string(),
            self.runner_package.clone(),
            "run".to_string(),
            identifier.to_string(),
        ]);
        if let Some(config) = config {
            args.push("--config".to_string());
            args.push(config.to_string());
        }
        args
    }

    pub fn get_args(&self, cli_name: &str) -> Vec<String> {
        vec![self.program.clone(), "mcp".into(), "get".into(), cli_name.to_string()]
    }

    pub fn remove_args(&self, cli_name: &str) -> Vec<String> {
        vec![self.program.clone(), "mcp".into(), "remove".into(), cli_name.to_string()]
    }
}

/// Host CLI names allow only letters, digits, `-` and `_`.
/// `@scope/pkg` becomes `scope-pkg`; other runs of invalid characters
/// collapse to a single `-`.
pub fn sanitize_cli_name(identifier: &str) -> String {
    let mut result = String::with_capacity(identifier.len());
    for ch in identifier.trim().chars() {
        if ch == '@' {
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' {
            result.push(ch);
        } else if !result.ends_with('-') {
            result.push('-');
        }
    }
    result.trim_matches('-').to_string()
}

// ── API key hints ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequirement {
    pub env_var: &'static str,
    pub instructions: &'static str,
}

const KNOWN_API_REQUIREMENTS: &[(&str, &str, &str)] = &[
    ("redis", "REDIS_URL", "Set REDIS_URL to your Redis connection string"),
    ("datadog", "DD_API_KEY", "Set DD_API_KEY to your Datadog API key"),
    ("slack", "SLACK_BOT_TOKEN", "Set SLACK_BOT_TOKEN to your Slack bot token"),
    ("github", "GITHUB_TOKEN", "Set GITHUB_TOKEN to a GitHub personal access token"),
    (
        "aws",
        "AWS_ACCESS_KEY_ID",
        "Configure AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
    ),
];

/// Well-known services whose servers need credentials to start.
pub fn detect_api_requirement(identifier: &str) -> Option<ApiRequirement> {
    let lower = identifier.to_lowercase();
    KNOWN_API_REQUIREMENTS
        .iter()
        .find(|(service, _, _)| lower.contains(service))
        .map(|(_, env_var, instructions)| ApiRequirement {
            env_var,
            instructions,
        })
}

// ── Requests / reports ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub identifier: String,
    /// Full argv to run instead of the host-CLI convention.
    pub command_override: Option<Vec<String>>,
    pub timeout: Option<Duration>,
    pub env: BTreeMap<String, String>,
    /// Server config forwarded as `--config <json>` (convention only).
    pub config: Option<Value>,
}

impl InstallRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub identifier: String,
    /// Host CLI registration name; `None` for command-override installs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli_name: Option<String>,
    pub record: InstalledRecord,
    pub execution: ExecutionResult,
    /// `true` when an existing record was overwritten.
    pub replaced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_requirements: Option<ApiRequirement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallState {
    Installed,
    InstalledButNotRegistered,
    NotInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CliRegistration {
    Registered,
    NotRegistered,
    /// The CLI could not be run or did not answer in time.
    Unavailable,
    /// Installed by a command override; the host CLI does not own it.
    Unmanaged,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli_name: Option<String>,
    pub state: InstallState,
    /// Whether the local store holds a record.
    pub verified: bool,
    pub cli_registration: CliRegistration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<InstalledRecord>,
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledEntry {
    pub identifier: String,
    #[serde(flatten)]
    pub record: InstalledRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReport {
    pub installed: Vec<InstalledEntry>,
    pub total_count: usize,
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRemoval {
    /// `false` when the record was never registered with the host CLI.
    pub attempted: bool,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallReport {
    pub identifier: String,
    pub removed: InstalledRecord,
    pub external_removal: ExternalRemoval,
    pub config_path: PathBuf,
}

// ── Reconciler ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub default_timeout: Duration,
    /// Bound for `mcp get` / `mcp remove` calls to the host CLI.
    pub cli_timeout: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(180),
            cli_timeout: Duration::from_secs(15),
        }
    }
}

pub struct Reconciler {
    registry: RegistryClient,
    store: ConfigStore,
    executor: InstallExecutor,
    cli: HostCli,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        registry: RegistryClient,
        store: ConfigStore,
        executor: InstallExecutor,
        cli: HostCli,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            registry,
            store,
            executor,
            cli,
            options,
        }
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn cli(&self) -> &HostCli {
        &self.cli
    }

    /// Argv the convention would run for `identifier` with no extras.
    pub fn default_install_command(&self, identifier: &str) -> Vec<String> {
        self.cli
            .add_args(&sanitize_cli_name(identifier), identifier, &BTreeMap::new(), None)
    }

    /// Current config snapshot (no lock; saves are atomic renames).
    pub async fn snapshot(&self) -> ScoutResult<Config> {
        let store = self.store.clone();
        run_blocking(move || store.load()).await
    }

    pub async fn install(&self, request: InstallRequest) -> ScoutResult<InstallReport> {
        let identifier = require_identifier(&request.identifier)?;
        let cli_name = sanitize_cli_name(&identifier);
        if cli_name.is_empty() {
            return Err(ScoutError::InvalidInput(format!(
                "'{}' has no characters usable as a CLI name",
                identifier
            )));
        }
        let timeout = request.timeout.unwrap_or(self.options.default_timeout);

        let (argv, registered_as) = match request.command_override {
            Some(argv) => {
                if argv.first().is_none_or(|program| program.trim().is_empty()) {
                    return Err(ScoutError::InvalidInput(
                        "commandOverride must start with a program name".into(),
                    ));
                }
                (argv, None)
            }
            None => (
                self.cli
                    .add_args(&cli_name, &identifier, &request.env, request.config.as_ref()),
                Some(cli_name),
            ),
        };

        // An unreadable config must stop the call before anything external runs.
        self.snapshot().await?;

        tracing::info!(identifier = %identifier, timeout_secs = timeout.as_secs(), "reconcile: install");
        let execution = self.executor.run(&argv, timeout).await?;

        if execution.timed_out {
            tracing::warn!(identifier = %identifier, "reconcile: install timed out, config untouched");
            return Err(ScoutError::InstallTimeout {
                timeout_secs: timeout.as_secs(),
                execution: Box::new(execution),
            });
        }
        if !execution.succeeded() {
            tracing::warn!(
                identifier = %identifier,
                exit_code = execution.exit_code,
                "reconcile: install failed, config untouched"
            );
            return Err(ScoutError::InstallFailed {
                execution: Box::new(execution),
            });
        }

        let (command, args) = match argv.split_first() {
            Some((command, args)) => (command.clone(), args.to_vec()),
            None => return Err(ScoutError::Internal("resolved command is empty".into())),
        };
        let candidate = InstalledRecord {
            command,
            args,
            env: request.env,
            installed_at: Utc::now(),
            cli_name: registered_as.clone(),
        };

        let store = self.store.clone();
        let key = identifier.clone();
        let (record, replaced) = run_blocking(move || {
            store.update(move |config| {
                let mut record = candidate;
                // Never move a record's timestamp backwards on re-install.
                if let Some(previous) = config.get(&key) {
                    record.installed_at = record.installed_at.max(previous.installed_at);
                }
                let replaced = config.upsert(&key, record.clone()).is_some();
                Ok((record, replaced))
            })
        })
        .await?;

        audit::log_audit(
            "install",
            serde_json::json!({ "identifier": identifier, "replaced": replaced, "command": record.argv() }),
        );

        Ok(InstallReport {
            api_requirements: detect_api_requirement(&identifier),
            identifier,
            cli_name: registered_as,
            record,
            execution,
            replaced,
        })
    }

    pub async fn verify(&self, identifier: &str) -> ScoutResult<VerifyReport> {
        let identifier = require_identifier(identifier)?;
        let config = self.snapshot().await?;
        let record = config.get(&identifier).cloned();
        let cli_name = match &record {
            Some(record) => record.cli_name.clone(),
            None => Some(sanitize_cli_name(&identifier)),
        };

        let cli_registration = match &cli_name {
            Some(name) => self.probe_cli(name).await,
            None => CliRegistration::Unmanaged,
        };
        let state = match (&record, cli_registration) {
            (None, _) => InstallState::NotInstalled,
            (Some(_), CliRegistration::NotRegistered) => InstallState::InstalledButNotRegistered,
            (Some(_), _) => InstallState::Installed,
        };

        tracing::info!(identifier = %identifier, state = ?state, cli = ?cli_registration, "reconcile: verify");

        Ok(VerifyReport {
            verified: record.is_some(),
            identifier,
            cli_name,
            state,
            cli_registration,
            record,
            config_path: self.store.path().to_path_buf(),
        })
    }

    pub async fn list(&self) -> ScoutResult<ListReport> {
        let config = self.snapshot().await?;
        let installed: Vec<InstalledEntry> = config
            .servers
            .into_iter()
            .map(|(identifier, record)| InstalledEntry { identifier, record })
            .collect();
        Ok(ListReport {
            total_count: installed.len(),
            installed,
            config_path: self.store.path().to_path_buf(),
        })
    }

    pub async fn uninstall(&self, identifier: &str) -> ScoutResult<UninstallReport> {
        let identifier = require_identifier(identifier)?;

        let store = self.store.clone();
        let key = identifier.clone();
        let removed = run_blocking(move || {
            store.update(move |config| config.remove(&key).ok_or(ScoutError::NotInstalled(key)))
        })
        .await?;

        let external_removal = match &removed.cli_name {
            Some(cli_name) => self.remove_from_cli(cli_name).await,
            None => ExternalRemoval {
                attempted: false,
                succeeded: false,
                error: None,
                execution: None,
            },
        };

        audit::log_audit(
            "uninstall",
            serde_json::json!({
                "identifier": identifier,
                "externalRemoval": external_removal.succeeded,
            }),
        );

        Ok(UninstallReport {
            identifier,
            removed,
            external_removal,
            config_path: self.store.path().to_path_buf(),
        })
    }

    async fn probe_cli(&self, cli_name: &str) -> CliRegistration {
        match self
            .executor
            .run(&self.cli.get_args(cli_name), self.options.cli_timeout)
            .await
        {
            Ok(execution) if execution.timed_out => CliRegistration::Unavailable,
            Ok(execution) if execution.succeeded() => CliRegistration::Registered,
            Ok(_) => CliRegistration::NotRegistered,
            Err(e) => {
                tracing::debug!(cli = %self.cli.program, "reconcile: CLI probe unavailable: {}", e);
                CliRegistration::Unavailable
            }
        }
    }

    async fn remove_from_cli(&self, cli_name: &str) -> ExternalRemoval {
        match self
            .executor
            .run(&self.cli.remove_args(cli_name), self.options.cli_timeout)
            .await
        {
            Ok(execution) => {
                let succeeded = execution.succeeded();
                if !succeeded {
                    tracing::warn!(cli_name = %cli_name, exit_code = execution.exit_code, "reconcile: CLI removal failed");
                }
                ExternalRemoval {
                    attempted: true,
                    succeeded,
                    error: (!succeeded).then(|| {
                        if execution.timed_out {
                            "host CLI removal timed out".to_string()
                        } else {
                            format!("host CLI exited with code {}", execution.exit_code)
                        }
                    }),
                    execution: Some(execution),
                }
            }
            Err(e) => {
                tracing::warn!(cli_name = %cli_name, "reconcile: CLI removal could not run: {}", e);
                ExternalRemoval {
                    attempted: true,
                    succeeded: false,
                    error: Some(e.to_string()),
                    execution: None,
                }
            }
        }
    }
}

fn require_identifier(identifier: &str) -> ScoutResult<String> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(ScoutError::InvalidInput(
            "identifier is required and cannot be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

async fn run_blocking<T, F>(f: F) -> ScoutResult<T>
where
    F: FnOnce() -> ScoutResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ScoutError::Internal(format!("store task failed: {}", e)))?
}
