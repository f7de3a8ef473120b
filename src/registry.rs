// MCP Scout -- registry
//! Authenticated HTTP client for the remote server registry.
//!
//! Thin on purpose: no cache, no retries, no local ranking. Search filters
//! are forwarded verbatim as query parameters.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{ScoutError, ScoutResult};

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.smithery.ai";
pub const MAX_SEARCH_LIMIT: usize = 100;

// ── Credential ──────────────────────────────────────────────────────────────

/// Registry API key. Loaded once at startup and never mutated.
#[derive(Clone)]
pub struct RegistryCredential(String);

impl RegistryCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RegistryCredential(***)")
    }
}

// ── Catalog types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub config_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityInfo {
    pub scan_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

/// A catalog record. Search results fill the summary fields; details add
/// connections, tools and security info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub qualified_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deployed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolInfo>>,
}

/// One config field a connection requires.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequirements {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub required_fields: Vec<RequiredField>,
    pub config_schema: Value,
}

impl Entry {
    /// Required config fields per connection, read from each `configSchema`.
    pub fn config_requirements(&self) -> Vec<ConnectionRequirements> {
        self.connections
            .iter()
            .map(|conn| {
                let properties = conn.config_schema.get("properties");
                let required_fields = conn
                    .config_schema
                    .get("required")
                    .and_then(|r| r.as_array())
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(|n| n.as_str())
                            .map(|name| {
                                let prop = properties.and_then(|p| p.get(name));
                                RequiredField {
                                    name: name.to_string(),
                                    kind: prop
                                        .and_then(|p| p.get("type"))
                                        .and_then(|t| t.as_str())
                                        .unwrap_or("string")
                                        .to_string(),
                                    description: prop
                                        .and_then(|p| p.get("description"))
                                        .and_then(|d| d.as_str())
                                        .unwrap_or_default()
                                        .to_string(),
                                }
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ConnectionRequirements {
                    kind: conn.kind.clone(),
                    url: conn.url.clone(),
                    required_fields,
                    config_schema: conn.config_schema.clone(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ServerList {
    #[serde(default)]
    servers: Vec<Entry>,
    #[serde(default)]
    pagination: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<Entry>,
    pub total_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
}

// ── Filters ─────────────────────────────────────────────────────────────────

/// A scalar filter value. The registry's filter vocabulary is not known here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Integer(i) => write!(f, "{}", i),
            FilterValue::Float(x) => write!(f, "{}", x),
            FilterValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFilters(pub BTreeMap<String, FilterValue>);

impl SearchFilters {
    /// Accepts an object, a string holding a JSON object, or null.
    pub fn from_value(value: Option<&Value>) -> ScoutResult<Self> {
        let object = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ScoutError::InvalidFilters(
                        "filters must be a JSON object, not an array or primitive".into(),
                    ));
                }
                Err(e) => {
                    return Err(ScoutError::InvalidFilters(format!(
                        "filters string is not valid JSON: {}",
                        e
                    )));
                }
            },
            Some(other) => {
                return Err(ScoutError::InvalidFilters(format!(
                    "filters must be an object or JSON string, got {}",
                    json_type_name(other)
                )));
            }
        };

        let mut filters = BTreeMap::new();
        for (key, value) in object {
            let scalar = match value {
                Value::Bool(b) => FilterValue::Bool(b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => FilterValue::Integer(i),
                    None => FilterValue::Float(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => FilterValue::Text(s),
                other => {
                    return Err(ScoutError::InvalidFilters(format!(
                        "filter '{}' must be a scalar, got {}",
                        key,
                        json_type_name(&other)
                    )));
                }
            };
            filters.insert(key, scalar);
        }
        Ok(Self(filters))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Client ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    credential: RegistryCredential,
}

impl RegistryClient {
    pub fn new(client: Client, base_url: &str, credential: RegistryCredential) -> ScoutResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| ScoutError::InvalidInput(format!("invalid registry URL '{}': {}", base_url, e)))?;
        Ok(Self {
            client,
            base_url,
            credential,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /servers` with the query, page size and filters.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> ScoutResult<SearchResults> {
        if limit == 0 || limit > MAX_SEARCH_LIMIT {
            return Err(ScoutError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_SEARCH_LIMIT
            )));
        }

        let mut url = self.url("servers")?;
        {
            let mut pairs = url.query_pairs_mut();
            let query = query.trim();
            if !query.is_empty() {
                pairs.append_pair("q", query);
            }
            pairs.append_pair("page", "1");
            pairs.append_pair("pageSize", &limit.to_string());
            for (key, value) in &filters.0 {
                pairs.append_pair(key, &value.to_string());
            }
        }

        let list: ServerList = self.get_json(url, query).await?;
        let mut results = list.servers;
        results.truncate(limit);

        tracing::info!(query = %query, limit, returned = results.len(), "registry: search complete");

        Ok(SearchResults {
            total_results: results.len(),
            results,
            pagination: list.pagination,
        })
    }

    /// `GET /servers/{id}`.
    pub async fn get_details(&self, id: &str) -> ScoutResult<Entry> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ScoutError::InvalidInput("identifier must not be empty".into()));
        }
        let mut url = self.url("servers")?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ScoutError::InvalidInput(format!("registry URL '{}' cannot hold a path", self.base_url))
            })?;
            // Each `/`-separated part is pushed as one encoded segment.
            for segment in id.split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(ScoutError::InvalidInput(format!(
                        "identifier '{}' has an empty or relative path segment",
                        id
                    )));
                }
                segments.push(segment);
            }
        }
        self.get_json(url, id).await
    }

    fn url(&self, path: &str) -> ScoutResult<Url> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| ScoutError::InvalidInput(format!("invalid registry path '{}': {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, subject: &str) -> ScoutResult<T> {
        tracing::debug!(url = %url, "registry: GET");

        let response = self
            .client
            .get(url.clone())
            .header("Authorization", self.credential.bearer())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ScoutError::Network(format!("request to {} failed: {}", url.path(), e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), url = %url, "registry: request failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ScoutError::Auth(format!("HTTP {}", status.as_u16()))
                }
                StatusCode::NOT_FOUND => ScoutError::NotFound(subject.to_string()),
                _ => ScoutError::Registry {
                    status: status.as_u16(),
                    message: truncate_str(&body_text, 500),
                },
            });
        }

        response.json::<T>().await.map_err(|e| ScoutError::Registry {
            status: status.as_u16(),
            message: format!("response is not valid JSON: {}", e),
        })
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let boundary = (0..=max_len)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}...", &s[..boundary])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters_accept_object_and_json_string() {
        let from_object = SearchFilters::from_value(Some(&json!({"isVerified": true, "owner": "acme"}))).unwrap();
        let from_string =
            SearchFilters::from_value(Some(&json!(r#"{"isVerified": true, "owner": "acme"}"#))).unwrap();
        assert_eq!(from_object, from_string);
        assert_eq!(from_object.0["isVerified"], FilterValue::Bool(true));
        assert_eq!(from_object.0["owner"].to_string(), "acme");
        assert!(SearchFilters::from_value(None).unwrap().is_empty());
        assert!(SearchFilters::from_value(Some(&Value::Null)).unwrap().is_empty());
    }

    #[test]
    fn test_filters_reject_non_scalars() {
        let err = SearchFilters::from_value(Some(&json!({"tags": ["a"]}))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTERS");
        let err = SearchFilters::from_value(Some(&json!("[1, 2]"))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTERS");
        let err = SearchFilters::from_value(Some(&json!("{oops"))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTERS");
        let err = SearchFilters::from_value(Some(&json!(42))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTERS");
    }

    #[test]
    fn test_filter_values_render_as_query_strings() {
        assert_eq!(FilterValue::Bool(false).to_string(), "false");
        assert_eq!(FilterValue::Integer(7).to_string(), "7");
        assert_eq!(FilterValue::Float(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = RegistryCredential::new("sk-secret");
        assert_eq!(format!("{:?}", cred), "RegistryCredential(***)");
        assert_eq!(cred.bearer(), "Bearer sk-secret");
    }

    #[test]
    fn test_config_requirements_from_schema() {
        let entry: Entry = serde_json::from_value(json!({
            "qualifiedName": "@redis/mcp-redis",
            "connections": [{
                "type": "stdio",
                "configSchema": {
                    "required": ["redisUrl"],
                    "properties": {
                        "redisUrl": { "type": "string", "description": "Connection string" },
                        "db": { "type": "integer" }
                    }
                }
            }]
        }))
        .unwrap();
        let reqs = entry.config_requirements();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].kind, "stdio");
        assert_eq!(
            reqs[0].required_fields,
            vec![RequiredField {
                name: "redisUrl".into(),
                kind: "string".into(),
                description: "Connection string".into(),
            }]
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = RegistryClient::new(Client::new(), "not a url", RegistryCredential::new("k")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello...");
    }

    #[test]
    fn test_truncate_str_never_exceeds_limit_on_multibyte() {
        // "é" is two bytes; a cut at 3 must not include the second one.
        assert_eq!(truncate_str("ééé", 3), "é...");
        assert_eq!(truncate_str("ééé", 4), "éé...");
        assert_eq!(truncate_str("😀x", 2), "...");
    }
}
