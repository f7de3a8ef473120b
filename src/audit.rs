// MCP Scout -- audit
//! Audit trail for operations that change installed state.
//!
//! Entries go to the `audit` tracing target so they can be routed or
//! filtered separately (`RUST_LOG=audit=info`). Auditing never fails the
//! operation that triggered it.

use serde_json::Value;

/// Record an audit entry.
///
/// * `action` — machine-readable action name (e.g. "install", "uninstall").
/// * `details` — JSON payload with context (identifier, command, outcome).
pub fn log_audit(action: &str, details: Value) {
    tracing::info!(target: "audit", action = %action, details = %details, "audit");
}
