// MCP Scout -- error
//! Error taxonomy shared by every operation.
//!
//! Each variant maps to a machine-readable `errorCode`. Errors never escape a
//! tool call: the tool layer turns them into a structured
//! `{ "status": "error", "errorCode": ..., "message": ... }` result via
//! [`ScoutError::to_tool_result`].

use std::path::PathBuf;

use serde_json::{json, Value};

use crate::executor::ExecutionResult;

#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    #[error("Registry unreachable: {0}")]
    Network(String),

    #[error("Registry rejected the API key: {0}")]
    Auth(String),

    #[error("Not found in registry: {0}")]
    NotFound(String),

    #[error("Registry returned HTTP {status}: {message}")]
    Registry { status: u16, message: String },

    #[error("Config file {} is corrupt: {reason}", path.display())]
    CorruptConfig { path: PathBuf, reason: String },

    #[error("Config file {} could not be accessed: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Installation timed out after {timeout_secs}s")]
    InstallTimeout {
        timeout_secs: u64,
        execution: Box<ExecutionResult>,
    },

    #[error("Installation command exited with code {}", execution.exit_code)]
    InstallFailed { execution: Box<ExecutionResult> },

    #[error("'{0}' is not installed")]
    NotInstalled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScoutError {
    /// Machine-readable error code for each variant.
    pub fn error_code(&self) -> &'static str {
        match self {
            ScoutError::InvalidInput(_) => "INVALID_INPUT",
            ScoutError::InvalidFilters(_) => "INVALID_FILTERS",
            ScoutError::Network(_) => "NETWORK_ERROR",
            ScoutError::Auth(_) => "AUTH_ERROR",
            ScoutError::NotFound(_) => "NOT_FOUND",
            ScoutError::Registry { .. } => "REGISTRY_ERROR",
            ScoutError::CorruptConfig { .. } => "CORRUPT_CONFIG",
            ScoutError::ConfigIo { .. } => "CONFIG_IO_ERROR",
            ScoutError::Spawn { .. } => "SPAWN_FAILED",
            ScoutError::InstallTimeout { .. } => "INSTALL_TIMEOUT",
            ScoutError::InstallFailed { .. } => "INSTALL_FAILED",
            ScoutError::NotInstalled(_) => "NOT_INSTALLED",
            ScoutError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Extra diagnostics attached to the structured result, if any.
    fn details(&self) -> Option<Value> {
        match self {
            ScoutError::InstallTimeout {
                timeout_secs,
                execution,
            } => Some(json!({
                "timeoutSeconds": timeout_secs,
                "execution": execution,
                "hint": "Re-run install_mcp with a larger timeoutSeconds if the package download is slow",
            })),
            ScoutError::InstallFailed { execution } => Some(json!({ "execution": execution })),
            ScoutError::Registry { status, .. } => Some(json!({ "httpStatus": status })),
            ScoutError::CorruptConfig { path, .. } | ScoutError::ConfigIo { path, .. } => {
                Some(json!({ "configPath": path }))
            }
            _ => None,
        }
    }

    /// Convert into the structured result returned to MCP callers.
    pub fn to_tool_result(&self) -> Value {
        let mut body = json!({
            "status": "error",
            "errorCode": self.error_code(),
            "message": self.to_string(),
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        body
    }
}

pub type ScoutResult<T> = Result<T, ScoutError>;
