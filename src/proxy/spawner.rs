//! Proxied MCP server process spawner.
//!
//! Spawns the standalone `rwx mcp serve` process with:
//! - `kill_on_drop(true)` so the child is cleaned up automatically.
//! - `env_clear()` + a safe variable allowlist so nothing beyond PATH-level
//!   context and the RWX token reaches the child's environment.
//! - All three stdio streams captured (never inherited) — stdout carries the
//!   JSON-RPC response stream, stderr carries diagnostics only.

use std::path::PathBuf;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::{AppError, Result};

/// Environment variables inherited by the spawned server process.
///
/// Everything else is stripped via `env_clear()` before launch.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    "RWX_ACCESS_TOKEN",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// Configuration for spawning the proxied MCP server process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Server binary (e.g. `rwx`).
    pub command: String,
    /// Arguments passed to the binary (e.g. `["mcp", "serve"]`).
    pub args: Vec<String>,
    /// Working directory for the child; inherited when `None`.
    pub working_dir: Option<PathBuf>,
}

/// Active stdio connection to a spawned server process.
///
/// The caller keeps `child` alive (it has `kill_on_drop(true)`) and owns the
/// three pipes until the session's reader/writer tasks take them over.
#[derive(Debug)]
pub struct ServerConnection {
    /// Child process handle.
    pub child: Child,
    /// Child stdin — the outbound request stream.
    pub stdin: ChildStdin,
    /// Child stdout — the inbound response stream.
    pub stdout: ChildStdout,
    /// Child stderr — out-of-band diagnostics.
    pub stderr: ChildStderr,
}

/// Spawn the server process and capture its stdio pipes.
///
/// # Errors
///
/// - `AppError::Proxy("failed to spawn server: …")` — OS spawn failure.
/// - `AppError::Proxy("failed to capture server …")` — a pipe was not
///   provided by the runtime (should not happen with piped stdio).
pub fn spawn_server(config: &SpawnConfig) -> Result<ServerConnection> {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);

    // Strip inherited environment, then inject only the safe allowlist.
    cmd.env_clear();
    for &key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }

    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Proxy(format!("failed to spawn server: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Proxy("failed to capture server stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Proxy("failed to capture server stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Proxy("failed to capture server stderr".into()))?;

    debug!(command = %config.command, "proxied server process spawned");

    Ok(ServerConnection {
        child,
        stdin,
        stdout,
        stderr,
    })
}
