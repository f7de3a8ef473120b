// MCP Scout -- mcp/stdio
//! Line-delimited JSON-RPC over stdin/stdout.
//!
//! One message per line. Requests are handled one at a time, in order.
//! stdout carries protocol traffic only; logs go to stderr.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::mcp::server::{handle_request, json_rpc_error};
use crate::state::AppState;

/// Serve the process's own stdin/stdout until stdin closes.
pub async fn serve_stdio(state: AppState) -> std::io::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    serve(state, reader, writer).await
}

pub async fn serve<R, W>(state: AppState, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(request) => handle_request(&state, &request).await,
            Err(e) => {
                tracing::warn!("stdio: unparseable message: {}", e);
                Some(json_rpc_error(Value::Null, -32700, &format!("Parse error: {}", e)))
            }
        };

        if let Some(response) = response {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
    }
    tracing::info!("stdio: input closed, shutting down");
    Ok(())
}
