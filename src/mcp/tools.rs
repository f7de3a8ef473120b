// MCP Scout -- mcp/tools
//! Tool catalogue and `tools/call` dispatch.
//!
//! Every tool returns a JSON object with `status` (`success` | `error`) and
//! `message`; errors add `errorCode`. Nothing here panics or propagates:
//! a failed call is just a structured result.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{ScoutError, ScoutResult};
use crate::reconcile::{detect_api_requirement, InstallRequest, InstallState, Reconciler};
use crate::registry::SearchFilters;

const DEFAULT_SEARCH_LIMIT: u64 = 10;

/// Central dispatcher. Returns `None` for an unknown tool name.
pub async fn call_tool(scout: &Reconciler, name: &str, args: &Value) -> Option<Value> {
    let result = match name {
        "search_registry" => search_registry(scout, args).await,
        "get_mcp_info" => get_mcp_info(scout, args).await,
        "collect_config" => collect_config(scout, args).await,
        "install_mcp" => install_mcp(scout, args).await,
        "verify_installation" => verify_installation(scout, args).await,
        "list_installed" => list_installed(scout).await,
        "uninstall_mcp" => uninstall_mcp(scout, args).await,
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| {
        tracing::warn!(tool = %name, code = e.error_code(), "tool call failed: {}", e);
        e.to_tool_result()
    }))
}

// ── search_registry ─────────────────────────────────────────────────────────

async fn search_registry(scout: &Reconciler, args: &Value) -> ScoutResult<Value> {
    let query = args
        .get("query")
        .and_then(|q| q.as_str())
        .ok_or_else(|| ScoutError::InvalidInput("Missing required argument: query".into()))?;
    let limit = match args.get("limit") {
        None | Some(Value::Null) => DEFAULT_SEARCH_LIMIT,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| ScoutError::InvalidInput("limit must be a positive integer".into()))?,
    };
    let filters = SearchFilters::from_value(args.get("filters"))?;

    let results = scout
        .registry()
        .search(query, limit as usize, &filters)
        .await?;
    let message = format!("Found {} result(s) for '{}'", results.total_results, query);
    let mut body = success(message, &results)?;
    body["query"] = json!(query);
    body["filters"] = json!(filters);
    Ok(body)
}

// ── get_mcp_info ────────────────────────────────────────────────────────────

async fn get_mcp_info(scout: &Reconciler, args: &Value) -> ScoutResult<Value> {
    let id = identifier_arg(args)?;
    let entry = scout.registry().get_details(&id).await?;

    // Advisory only: a corrupt local config must not hide registry data.
    let installed = match scout.snapshot().await {
        Ok(config) => Some(config.contains(&entry.qualified_name)),
        Err(e) => {
            tracing::warn!("get_mcp_info: local config unreadable: {}", e);
            None
        }
    };

    Ok(json!({
        "status": "success",
        "message": format!("Details for '{}'", entry.qualified_name),
        "installCommand": scout.default_install_command(&entry.qualified_name),
        "installed": installed,
        "entry": entry,
    }))
}

// ── collect_config ──────────────────────────────────────────────────────────

async fn collect_config(scout: &Reconciler, args: &Value) -> ScoutResult<Value> {
    let id = identifier_arg(args)?;
    let entry = scout.registry().get_details(&id).await?;
    let connections = entry.config_requirements();
    let required_total: usize = connections.iter().map(|c| c.required_fields.len()).sum();

    Ok(json!({
        "status": "success",
        "message": format!(
            "'{}' declares {} connection(s) with {} required field(s)",
            entry.qualified_name,
            connections.len(),
            required_total
        ),
        "qualifiedName": entry.qualified_name,
        "displayName": entry.display_name,
        "connections": connections,
        "apiRequirements": detect_api_requirement(&entry.qualified_name),
        "security": entry.security,
    }))
}

// ── install_mcp ─────────────────────────────────────────────────────────────

async fn install_mcp(scout: &Reconciler, args: &Value) -> ScoutResult<Value> {
    let mut request = InstallRequest::new(identifier_arg(args)?);
    request.command_override = command_override_arg(args)?;
    request.timeout = timeout_arg(args)?;
    request.env = env_arg(args)?;
    request.config = match args.get("config") {
        None | Some(Value::Null) => None,
        Some(v @ Value::Object(_)) => Some(v.clone()),
        Some(_) => return Err(ScoutError::InvalidInput("config must be an object".into())),
    };

    let report = scout.install(request).await?;
    let mut message = match &report.cli_name {
        Some(cli_name) => format!(
            "Installed '{}' as '{}'. Restart the client to load it.",
            report.identifier, cli_name
        ),
        None => format!("Installed '{}' with the given command", report.identifier),
    };
    if let Some(req) = &report.api_requirements {
        message.push_str(&format!(" This server needs credentials: {}.", req.instructions));
    }
    success(message, &report)
}

// ── verify_installation ─────────────────────────────────────────────────────

async fn verify_installation(scout: &Reconciler, args: &Value) -> ScoutResult<Value> {
    let id = identifier_arg(args)?;
    let report = scout.verify(&id).await?;
    let cli_name = report.cli_name.as_deref().unwrap_or("-");
    let message = match report.state {
        InstallState::Installed if report.cli_name.is_none() => {
            format!("'{}' is installed (custom command, not managed by the host CLI)", report.identifier)
        }
        InstallState::Installed => format!("'{}' is installed as '{}'", report.identifier, cli_name),
        InstallState::InstalledButNotRegistered => format!(
            "'{}' is recorded locally but the host CLI does not list '{}'",
            report.identifier, cli_name
        ),
        InstallState::NotInstalled => format!("'{}' is not installed", report.identifier),
    };
    success(message, &report)
}

// ── list_installed ──────────────────────────────────────────────────────────

async fn list_installed(scout: &Reconciler) -> ScoutResult<Value> {
    let report = scout.list().await?;
    success(format!("Found {} installed server(s)", report.total_count), &report)
}

// ── uninstall_mcp ───────────────────────────────────────────────────────────

async fn uninstall_mcp(scout: &Reconciler, args: &Value) -> ScoutResult<Value> {
    let id = identifier_arg(args)?;
    let report = scout.uninstall(&id).await?;
    let mut message = format!("Removed '{}' from the local config", report.identifier);
    if report.external_removal.attempted && !report.external_removal.succeeded {
        message.push_str("; host CLI removal failed, remove it manually if it is still listed");
    }
    success(message, &report)
}

// ── Argument helpers ────────────────────────────────────────────────────────

fn success<T: Serialize>(message: String, body: &T) -> ScoutResult<Value> {
    let mut value = serde_json::to_value(body)
        .map_err(|e| ScoutError::Internal(format!("failed to serialize result: {}", e)))?;
    if !value.is_object() {
        value = json!({ "result": value });
    }
    value["status"] = json!("success");
    value["message"] = json!(message);
    Ok(value)
}

fn identifier_arg(args: &Value) -> ScoutResult<String> {
    args.get("qualifiedName")
        .or_else(|| args.get("qualified_name"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            ScoutError::InvalidInput("qualifiedName is required and cannot be empty".into())
        })
}

/// An array of strings, or a whitespace-separated string.
fn command_override_arg(args: &Value) -> ScoutResult<Option<Vec<String>>> {
    let argv: Vec<String> = match args.get("commandOverride") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    ScoutError::InvalidInput("commandOverride entries must be strings".into())
                })
            })
            .collect::<ScoutResult<_>>()?,
        Some(_) => {
            return Err(ScoutError::InvalidInput(
                "commandOverride must be an array of strings".into(),
            ));
        }
    };
    if argv.is_empty() {
        return Err(ScoutError::InvalidInput("commandOverride must not be empty".into()));
    }
    Ok(Some(argv))
}

fn timeout_arg(args: &Value) -> ScoutResult<Option<Duration>> {
    match args.get("timeoutSeconds") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
            _ => Err(ScoutError::InvalidInput(
                "timeoutSeconds must be a positive integer".into(),
            )),
        },
    }
}

fn env_arg(args: &Value) -> ScoutResult<BTreeMap<String, String>> {
    match args.get("env") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                _ => Err(ScoutError::InvalidInput(format!("env value for '{}' must be a string", k))),
            })
            .collect(),
        Some(_) => Err(ScoutError::InvalidInput("env must be an object of strings".into())),
    }
}

// ── Tool catalogue for tools/list ───────────────────────────────────────────

pub fn tool_definitions() -> Vec<Value> {
    let qualified_name = json!({
        "type": "string",
        "description": "Registry identifier, e.g. '@redis/mcp-redis'"
    });
    vec![
        tool("search_registry", "Search the MCP server registry. Filters are passed to the registry unchanged.", json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What the server should do" },
                "limit": { "type": "integer", "description": "Max results (1-100, default 10)" },
                "filters": { "type": ["object", "string"], "description": "Registry filters, e.g. {\"isVerified\": true}" }
            },
            "required": ["query"]
        })),
        tool("get_mcp_info", "Fetch registry details for one server, with its default install command.", json!({
            "type": "object",
            "properties": { "qualifiedName": qualified_name },
            "required": ["qualifiedName"]
        })),
        tool("collect_config", "List the configuration fields a server requires before install.", json!({
            "type": "object",
            "properties": { "qualifiedName": qualified_name },
            "required": ["qualifiedName"]
        })),
        tool("install_mcp", "Install a server through the host CLI and record it locally on success.", json!({
            "type": "object",
            "properties": {
                "qualifiedName": qualified_name,
                "commandOverride": { "type": "array", "items": { "type": "string" }, "description": "Full command to run instead of the default" },
                "timeoutSeconds": { "type": "integer", "description": "Install timeout (default 180)" },
                "env": { "type": "object", "additionalProperties": { "type": "string" }, "description": "Environment variables for the server" },
                "config": { "type": "object", "description": "Server configuration passed as --config" }
            },
            "required": ["qualifiedName"]
        })),
        tool("verify_installation", "Check the local record and cross-check the host CLI.", json!({
            "type": "object",
            "properties": { "qualifiedName": qualified_name },
            "required": ["qualifiedName"]
        })),
        tool("list_installed", "List every locally recorded installation.", json!({
            "type": "object",
            "properties": {}
        })),
        tool("uninstall_mcp", "Remove the local record, then remove the server from the host CLI (best effort).", json!({
            "type": "object",
            "properties": { "qualifiedName": qualified_name },
            "required": ["qualifiedName"]
        })),
    ]
}

fn tool(name: &str, description: &str, input_schema: Value) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": input_schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definitions_are_unique() {
        let defs = tool_definitions();
        let mut names: Vec<&str> = defs.iter().filter_map(|d| d["name"].as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"install_mcp"));
    }

    #[test]
    fn test_identifier_arg_accepts_both_spellings() {
        assert_eq!(identifier_arg(&json!({"qualifiedName": " a/b "})).unwrap(), "a/b");
        assert_eq!(identifier_arg(&json!({"qualified_name": "a/b"})).unwrap(), "a/b");
        assert!(identifier_arg(&json!({"qualifiedName": "  "})).is_err());
        assert!(identifier_arg(&json!({})).is_err());
    }

    #[test]
    fn test_command_override_arg() {
        assert_eq!(
            command_override_arg(&json!({"commandOverride": ["echo", "ok"]})).unwrap(),
            Some(vec!["echo".to_string(), "ok".to_string()])
        );
        assert_eq!(
            command_override_arg(&json!({"commandOverride": "echo  ok"})).unwrap(),
            Some(vec!["echo".to_string(), "ok".to_string()])
        );
        assert_eq!(command_override_arg(&json!({})).unwrap(), None);
        assert!(command_override_arg(&json!({"commandOverride": []})).is_err());
        assert!(command_override_arg(&json!({"commandOverride": [1]})).is_err());
    }

    #[test]
    fn test_timeout_and_env_args() {
        assert_eq!(
            timeout_arg(&json!({"timeoutSeconds": 5})).unwrap(),
            Some(Duration::from_secs(5))
        );
        assert!(timeout_arg(&json!({"timeoutSeconds": 0})).is_err());
        assert!(timeout_arg(&json!({"timeoutSeconds": -3})).is_err());
        let env = env_arg(&json!({"env": {"A": "1"}})).unwrap();
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert!(env_arg(&json!({"env": {"A": 1}})).is_err());
    }
}
