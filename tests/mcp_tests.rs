// MCP Scout -- JSON-RPC surface over HTTP and stdio

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{app_state, body_json};
use mcp_scout::mcp::stdio;

fn rpc(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(state: &mcp_scout::state::AppState, body: Value) -> Value {
    let response = mcp_scout::create_router(state.clone())
        .oneshot(rpc(body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

#[tokio::test]
async fn initialize_reports_server_info() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), None);

    let json = call(&state, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})).await;

    assert_eq!(json["id"], 1);
    assert_eq!(json["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(json["result"]["serverInfo"]["name"], "mcp-scout");
    assert!(json["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn tools_list_names_every_tool() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), None);

    let json = call(&state, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;

    let names: Vec<&str> = json["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    for expected in [
        "search_registry",
        "get_mcp_info",
        "collect_config",
        "install_mcp",
        "verify_installation",
        "list_installed",
        "uninstall_mcp",
    ] {
        assert!(names.contains(&expected), "missing tool {}", expected);
    }
}

#[tokio::test]
async fn notification_gets_accepted_without_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = mcp_scout::create_router(app_state(dir.path(), None));

    let response = app
        .oneshot(rpc(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), None);

    let json = call(&state, json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"})).await;

    assert_eq!(json["error"]["code"], -32601);
}

#[tokio::test]
async fn unknown_tool_is_invalid_params() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), None);

    let json = call(&state, tool_call(4, "format_disk", json!({}))).await;

    assert_eq!(json["error"]["code"], -32602);
}

#[cfg(unix)]
#[tokio::test]
async fn install_list_uninstall_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), None);

    let installed = call(
        &state,
        tool_call(5, "install_mcp", json!({
            "qualifiedName": "@acme/notes",
            "timeoutSeconds": 5
        })),
    )
    .await;
    let result = &installed["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["status"], "success");
    assert_eq!(result["structuredContent"]["cliName"], "acme-notes");
    assert!(result["content"][0]["text"].as_str().unwrap().contains("acme-notes"));

    let listed = call(&state, tool_call(6, "list_installed", json!({}))).await;
    let list = &listed["result"]["structuredContent"];
    assert_eq!(list["totalCount"], 1);
    assert_eq!(list["installed"][0]["identifier"], "@acme/notes");
    assert_eq!(list["installed"][0]["command"], "true");
    assert_eq!(list["installed"][0]["cliName"], "acme-notes");

    let verified = call(&state, tool_call(7, "verify_installation", json!({"qualifiedName": "@acme/notes"}))).await;
    assert_eq!(verified["result"]["structuredContent"]["state"], "installed");
    assert_eq!(verified["result"]["structuredContent"]["cliRegistration"], "registered");

    let removed = call(&state, tool_call(8, "uninstall_mcp", json!({"qualifiedName": "@acme/notes"}))).await;
    assert_eq!(removed["result"]["structuredContent"]["status"], "success");

    let again = call(&state, tool_call(9, "uninstall_mcp", json!({"qualifiedName": "@acme/notes"}))).await;
    assert_eq!(again["result"]["isError"], true);
    assert_eq!(again["result"]["structuredContent"]["errorCode"], "NOT_INSTALLED");
}

#[tokio::test]
async fn invalid_arguments_become_error_results() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), None);

    let json = call(&state, tool_call(10, "install_mcp", json!({"qualifiedName": ""}))).await;
    assert_eq!(json["result"]["isError"], true);
    assert_eq!(json["result"]["structuredContent"]["errorCode"], "INVALID_INPUT");

    let json = call(
        &state,
        tool_call(11, "search_registry", json!({"query": "x", "filters": "[1,2]"})),
    )
    .await;
    assert_eq!(json["result"]["structuredContent"]["errorCode"], "INVALID_FILTERS");

    let json = call(&state, tool_call(12, "search_registry", json!({"query": "x"}))).await;
    assert_eq!(json["result"]["structuredContent"]["errorCode"], "NETWORK_ERROR");
}

#[tokio::test]
async fn mcp_requires_bearer_token_when_secret_is_set() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), Some("s3cret"));
    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

    let response = mcp_scout::create_router(state.clone())
        .oneshot(rpc(ping.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = rpc(ping);
    request
        .headers_mut()
        .insert("authorization", "Bearer s3cret".parse().unwrap());
    let response = mcp_scout::create_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stdio_answers_each_line_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path(), None);
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
        "\n",
        "not json\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"list_installed","arguments":{}}}"#, "\n",
    );
    let mut output = Vec::new();

    stdio::serve(state, input.as_bytes(), &mut output).await.unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["error"]["code"], -32700);
    assert_eq!(lines[2]["id"], 2);
    assert_eq!(lines[2]["result"]["structuredContent"]["totalCount"], 0);
}
