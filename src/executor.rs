// MCP Scout -- executor
//! Subprocess execution with a hard timeout.
//!
//! Commands are always spawned from a literal argument vector (`args[0]` is
//! the program). Nothing is ever passed through `sh -c`, so identifiers and
//! config values cannot inject shell syntax.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::error::{ScoutError, ScoutResult};

/// Exit code reported when the process was killed (timeout or signal).
pub const KILLED_EXIT_CODE: i32 = -1;

/// How long to wait for stdout/stderr to drain after the child is gone.
/// A grandchild that inherited the pipes could otherwise keep them open.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Outcome of a single subprocess run. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Runs external commands with captured output.
#[derive(Debug, Clone, Default)]
pub struct InstallExecutor {
    /// Written to the child's stdin, then stdin is closed.
    stdin_reply: Option<String>,
}

impl InstallExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer interactive prompts (e.g. `"y\n"`) by writing to stdin.
    pub fn with_stdin_reply(reply: impl Into<String>) -> Self {
        Self {
            stdin_reply: Some(reply.into()),
        }
    }

    /// Run `args` and wait at most `timeout`. On timeout the child is killed
    /// and reaped, and the result has `timed_out = true`.
    pub async fn run(&self, args: &[String], timeout: Duration) -> ScoutResult<ExecutionResult> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| ScoutError::InvalidInput("command must not be empty".into()))?;
        if program.trim().is_empty() {
            return Err(ScoutError::InvalidInput("command program must not be empty".into()));
        }
        if timeout.is_zero() {
            return Err(ScoutError::InvalidInput("timeout must be greater than zero".into()));
        }

        tracing::info!(program = %program, args = ?rest, timeout_secs = timeout.as_secs(), "executor: spawning");

        let started = Instant::now();
        let mut child = Command::new(program)
            .args(rest)
            .stdin(if self.stdin_reply.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScoutError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let (Some(reply), Some(mut stdin)) = (self.stdin_reply.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                // The child may exit without reading; a broken pipe is fine.
                let _ = stdin.write_all(reply.as_bytes()).await;
            });
        }

        let stdout_task = child.stdout.take().map(spawn_reader);
        let stderr_task = child.stderr.take().map(spawn_reader);

        let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code().unwrap_or(KILLED_EXIT_CODE), false),
            Ok(Err(e)) => {
                return Err(ScoutError::Internal(format!(
                    "failed to wait for '{}': {}",
                    program, e
                )));
            }
            Err(_) => {
                tracing::warn!(program = %program, "executor: timed out after {}s, killing", timeout.as_secs());
                if let Err(e) = child.kill().await {
                    tracing::warn!(program = %program, "executor: kill failed: {}", e);
                }
                (KILLED_EXIT_CODE, true)
            }
        };

        let stdout = drain(stdout_task).await;
        let stderr = drain(stderr_task).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            program = %program,
            exit_code,
            timed_out,
            elapsed_ms,
            "executor: finished"
        );

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            elapsed_ms,
            timed_out,
        })
    }
}

fn spawn_reader<R>(mut pipe: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf).await;
        buf
    })
}

async fn drain(task: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = task else {
        return String::new();
    };
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}
