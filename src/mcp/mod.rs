// MCP Scout -- mcp
//! MCP (Model Context Protocol) server surface.
//!
//! **Server** (`server`): JSON-RPC 2.0 dispatch, mounted at `POST /mcp`.
//! **Stdio** (`stdio`): the same dispatch over line-delimited stdin/stdout.
//! **Tools** (`tools`): the tool catalogue and argument handling.
//!
//! Protocol reference: <https://spec.modelcontextprotocol.io/2024-11-05/>

pub mod server;
pub mod stdio;
pub mod tools;
