// MCP Scout -- config
//! Process settings, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::registry::{RegistryCredential, DEFAULT_REGISTRY_URL};

pub const API_KEY_VAR: &str = "SMITHERY_API_KEY";
const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 180;
const DEFAULT_CLI_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PORT: u16 = 8081;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("SMITHERY_API_KEY is not set; the registry API key is required")]
    MissingApiKey,

    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("no config directory found; set SCOUT_CONFIG_PATH")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub credential: RegistryCredential,
    pub registry_url: String,
    pub config_path: PathBuf,
    pub host_cli: String,
    pub install_timeout: Duration,
    pub cli_timeout: Duration,
    pub transport: Transport,
    pub port: u16,
    /// Bearer secret for `/mcp`. `None` = auth disabled.
    pub auth_secret: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credential = get(API_KEY_VAR)
            .map(RegistryCredential::new)
            .ok_or(SettingsError::MissingApiKey)?;

        let config_path = match get("SCOUT_CONFIG_PATH") {
            Some(path) => PathBuf::from(path),
            None => dirs::config_dir()
                .ok_or(SettingsError::NoConfigDir)?
                .join("mcp-scout")
                .join("installed.json"),
        };

        let transport = match get("MCP_TRANSPORT").as_deref() {
            None | Some("stdio") => Transport::Stdio,
            Some("http") => Transport::Http,
            Some(other) => {
                return Err(SettingsError::Invalid {
                    var: "MCP_TRANSPORT",
                    value: other.to_string(),
                    reason: "expected 'stdio' or 'http'".to_string(),
                });
            }
        };

        Ok(Self {
            credential,
            registry_url: get("SCOUT_REGISTRY_URL").unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            config_path,
            host_cli: get("SCOUT_HOST_CLI").unwrap_or_else(|| "claude".to_string()),
            install_timeout: Duration::from_secs(parse_secs(
                "SCOUT_INSTALL_TIMEOUT_SECS",
                get("SCOUT_INSTALL_TIMEOUT_SECS"),
                DEFAULT_INSTALL_TIMEOUT_SECS,
            )?),
            cli_timeout: Duration::from_secs(parse_secs(
                "SCOUT_VERIFY_TIMEOUT_SECS",
                get("SCOUT_VERIFY_TIMEOUT_SECS"),
                DEFAULT_CLI_TIMEOUT_SECS,
            )?),
            transport,
            port: match get("PORT") {
                Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| SettingsError::Invalid {
                    var: "PORT",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
                None => DEFAULT_PORT,
            },
            auth_secret: get("AUTH_SECRET"),
        })
    }
}

fn parse_secs(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, SettingsError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(SettingsError::Invalid {
            var,
            value: raw,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(SettingsError::Invalid {
            var,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = settings(&[("SCOUT_CONFIG_PATH", "/tmp/x.json")]).unwrap_err();
        assert!(matches!(err, SettingsError::MissingApiKey));
        let err = settings(&[(API_KEY_VAR, "   ")]).unwrap_err();
        assert!(matches!(err, SettingsError::MissingApiKey));
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[(API_KEY_VAR, "key"), ("SCOUT_CONFIG_PATH", "/tmp/x.json")]).unwrap();
        assert_eq!(s.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(s.host_cli, "claude");
        assert_eq!(s.install_timeout, Duration::from_secs(180));
        assert_eq!(s.cli_timeout, Duration::from_secs(15));
        assert_eq!(s.transport, Transport::Stdio);
        assert_eq!(s.port, 8081);
        assert!(s.auth_secret.is_none());
        assert_eq!(s.config_path, PathBuf::from("/tmp/x.json"));
    }

    #[test]
    fn test_overrides_and_validation() {
        let s = settings(&[
            (API_KEY_VAR, "key"),
            ("SCOUT_CONFIG_PATH", "/tmp/x.json"),
            ("MCP_TRANSPORT", "http"),
            ("PORT", "9000"),
            ("SCOUT_INSTALL_TIMEOUT_SECS", "30"),
            ("AUTH_SECRET", "s3cret"),
        ])
        .unwrap();
        assert_eq!(s.transport, Transport::Http);
        assert_eq!(s.port, 9000);
        assert_eq!(s.install_timeout, Duration::from_secs(30));
        assert_eq!(s.auth_secret.as_deref(), Some("s3cret"));

        let err = settings(&[
            (API_KEY_VAR, "key"),
            ("SCOUT_CONFIG_PATH", "/tmp/x.json"),
            ("SCOUT_INSTALL_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { var: "SCOUT_INSTALL_TIMEOUT_SECS", .. }));

        let err = settings(&[
            (API_KEY_VAR, "key"),
            ("SCOUT_CONFIG_PATH", "/tmp/x.json"),
            ("MCP_TRANSPORT", "carrier-pigeon"),
        ])
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { var: "MCP_TRANSPORT", .. }));
    }
}
