// MCP Scout -- mcp/server
//! JSON-RPC 2.0 dispatch shared by the HTTP (`POST /mcp`) and stdio transports.
//!
//! Supported methods:
//! - `initialize` — server info + capabilities
//! - `notifications/initialized` — client ack (no-op)
//! - `tools/list` — the seven scout tools
//! - `tools/call` — execute a tool
//! - `ping` — health check

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::mcp::tools;
use crate::state::AppState;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP JSON-RPC 2.0 endpoint handler.
///
/// Notifications (no `id` field) are acknowledged with `202 Accepted`.
pub async fn mcp_handler(
    State(state): State<AppState>,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    match handle_request(&state, &request).await {
        Some(response) => (StatusCode::OK, Json(response)),
        None => (StatusCode::ACCEPTED, Json(json!({}))),
    }
}

/// Route one JSON-RPC message. Returns `None` when no response is due.
pub async fn handle_request(state: &AppState, request: &Value) -> Option<Value> {
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let Some(id) = request.get("id").cloned() else {
        tracing::debug!(method = %method, "MCP server: notification");
        return None;
    };

    tracing::debug!(method = %method, "MCP server: incoming request");

    if request.get("jsonrpc").and_then(|v| v.as_str()) != Some("2.0") {
        return Some(json_rpc_error(id, -32600, "Invalid Request: jsonrpc must be \"2.0\""));
    }

    let response = match method {
        "initialize" => handle_initialize(&id),
        "ping" => handle_ping(&id),
        "tools/list" => handle_tools_list(&id),
        "tools/call" => handle_tools_call(state, request, &id).await,
        _ => json_rpc_error(id, -32601, &format!("Method not found: {}", method)),
    };
    Some(response)
}

// ── initialize ──────────────────────────────────────────────────────────────

fn handle_initialize(id: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": "mcp-scout",
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Search the MCP server registry, inspect entries, and install, verify, list or uninstall servers through the host CLI."
        }
    })
}

// ── ping ────────────────────────────────────────────────────────────────────

fn handle_ping(id: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {}
    })
}

// ── tools/list ──────────────────────────────────────────────────────────────

fn handle_tools_list(id: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "tools": tools::tool_definitions()
        }
    })
}

// ── tools/call ──────────────────────────────────────────────────────────────

async fn handle_tools_call(state: &AppState, request: &Value, id: &Value) -> Value {
    let params = request.get("params").cloned().unwrap_or(json!({}));
    let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => json!({}),
        Some(args @ Value::Object(_)) => args.clone(),
        Some(_) => return json_rpc_error(id.clone(), -32602, "'arguments' must be an object"),
    };

    if tool_name.is_empty() {
        return json_rpc_error(id.clone(), -32602, "Missing 'name' in params");
    }

    tracing::info!(tool = %tool_name, "MCP server: tools/call");

    let Some(result) = tools::call_tool(&state.scout, tool_name, &arguments).await else {
        return json_rpc_error(id.clone(), -32602, &format!("Unknown tool: {}", tool_name));
    };

    let is_error = result.get("status").and_then(|s| s.as_str()) == Some("error");
    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [{ "type": "text", "text": text }],
            "structuredContent": result,
            "isError": is_error
        }
    })
}

// ── JSON-RPC error helper ───────────────────────────────────────────────────

pub fn json_rpc_error(id: Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}
