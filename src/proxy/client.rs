//! Proxy session lifecycle.
//!
//! [`ProxyClient`] owns the child process and presents a start/call/stop
//! contract. `start` wires the stdout reader, stdin writer, stderr drain,
//! and exit monitor tasks, then performs the fixed two-step handshake
//! (`initialize`, then `tools/list`) before declaring the session ready.
//!
//! A crashed or unreachable subprocess is fatal to the session: in-flight
//! requests are bulk-rejected, the state moves to [`SessionState::Stopped`],
//! and the caller must construct a fresh client to try again. Nothing at
//! this layer retries.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::proxy::codec::FrameCodec;
use crate::proxy::mux::RequestMux;
use crate::proxy::protocol::{initialize_params, ToolDescriptor};
use crate::proxy::spawner::{spawn_server, ServerConnection, SpawnConfig};
use crate::{AppError, Result};

/// Benign banner the server prints to stderr on startup; not a warning.
const STARTUP_BANNER: &str = "RWX CI/CD MCP Server running";

/// Depth of the outbound write queue between callers and the writer task.
const WRITE_QUEUE_DEPTH: usize = 64;

/// Session lifecycle states.
///
/// `Unstarted → Handshaking → Ready → Stopped`; `Stopped` is reachable
/// directly from any state on process exit or explicit stop, and no other
/// transition skips a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, `start` not yet called.
    Unstarted,
    /// Child spawned, handshake in progress.
    Handshaking,
    /// Handshake complete; `call` is permitted.
    Ready,
    /// Terminated — by `stop`, startup failure, or process exit. Terminal.
    Stopped,
}

/// Client for the proxied MCP server subprocess.
pub struct ProxyClient {
    state: Arc<Mutex<SessionState>>,
    mux: Arc<RequestMux>,
    tools: Arc<RwLock<Vec<ToolDescriptor>>>,
    write_rx: Mutex<Option<mpsc::Receiver<Value>>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ProxyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyClient").finish_non_exhaustive()
    }
}

impl ProxyClient {
    /// Create an unstarted client.
    #[must_use]
    pub fn new() -> Self {
        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        Self {
            state: Arc::new(Mutex::new(SessionState::Unstarted)),
            mux: Arc::new(RequestMux::new(write_tx)),
            tools: Arc::new(RwLock::new(Vec::new())),
            write_rx: Mutex::new(Some(write_rx)),
            cancel: CancellationToken::new(),
        }
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Remote tool descriptors discovered during startup.
    ///
    /// Empty until the session reaches [`SessionState::Ready`]; immutable
    /// afterwards.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().await.clone()
    }

    /// Spawn the server process and perform the startup handshake.
    ///
    /// Stream subscriptions (stdout reader, stderr drain, exit monitor) are
    /// active before the first handshake byte is written, so early response
    /// bytes cannot be lost.
    ///
    /// # Errors
    ///
    /// Any failure — spawn, pipe capture, handshake send, or a handshake
    /// response missing `protocolVersion` — propagates as a startup error
    /// and leaves the session stopped and unusable. Construct a new client
    /// to retry; this instance will not recover.
    pub async fn start(&self, config: &SpawnConfig) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if *state != SessionState::Unstarted {
                return Err(AppError::Proxy(format!(
                    "cannot start session in state {:?}",
                    *state
                )));
            }
            *state = SessionState::Handshaking;
        }

        let connection = match spawn_server(config) {
            Ok(conn) => conn,
            Err(err) => {
                *self.state.lock().await = SessionState::Stopped;
                return Err(err);
            }
        };

        let write_rx = self
            .write_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::Proxy("session was already started once".into()))?;

        self.spawn_io_tasks(connection, write_rx);

        match self.handshake().await {
            Ok(()) => {
                {
                    let mut state = self.state.lock().await;
                    // The exit monitor may have already moved the session to
                    // Stopped; a dead session must not be resurrected.
                    if *state != SessionState::Handshaking {
                        return Err(AppError::Proxy(
                            "server terminated during startup".into(),
                        ));
                    }
                    *state = SessionState::Ready;
                }
                info!(
                    tool_count = self.tools.read().await.len(),
                    "proxy session ready"
                );
                Ok(())
            }
            Err(err) => {
                self.stop().await;
                Err(err)
            }
        }
    }

    /// Invoke a remote tool by name.
    ///
    /// Valid only in [`SessionState::Ready`]; requests issued after the
    /// session stopped are rejected immediately by the state guard.
    ///
    /// # Errors
    ///
    /// - `AppError::Proxy("proxy client not initialized")` outside `Ready`.
    /// - [`AppError::Remote`] when the server answers with an error envelope.
    /// - [`AppError::Proxy`] when the session fails mid-flight.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        if self.state().await != SessionState::Ready {
            return Err(AppError::Proxy("proxy client not initialized".into()));
        }

        self.mux
            .send("tools/call", json!({ "name": name, "arguments": args }))
            .await
    }

    /// Stop the session.
    ///
    /// Idempotent: kills the child if one is held, rejects every outstanding
    /// request uniformly, and clears the capability list. Safe to call
    /// before `start`, after a failed `start`, and repeatedly.
    pub async fn stop(&self) {
        *self.state.lock().await = SessionState::Stopped;
        self.cancel.cancel();

        let rejected = self.mux.fail_all("session stopped").await;
        if rejected > 0 {
            debug!(rejected, "rejected outstanding requests on stop");
        }

        self.tools.write().await.clear();
    }

    // ── Startup internals ────────────────────────────────────────────────

    /// Spawn the reader, writer, stderr, and exit-monitor tasks.
    fn spawn_io_tasks(&self, connection: ServerConnection, write_rx: mpsc::Receiver<Value>) {
        let ServerConnection {
            child,
            stdin,
            stdout,
            stderr,
        } = connection;

        tokio::spawn(run_reader(
            stdout,
            Arc::clone(&self.mux),
            Arc::clone(&self.state),
            self.cancel.clone(),
        ));
        tokio::spawn(run_writer(stdin, write_rx, self.cancel.clone()));
        tokio::spawn(run_stderr_drain(stderr, self.cancel.clone()));
        tokio::spawn(monitor_exit(
            child,
            Arc::clone(&self.mux),
            Arc::clone(&self.state),
            self.cancel.clone(),
        ));
    }

    /// Fixed two-step handshake: `initialize`, then `tools/list`.
    async fn handshake(&self) -> Result<()> {
        let init = self.mux.send("initialize", initialize_params()).await?;

        if init.get("protocolVersion").is_none() {
            return Err(AppError::Proxy(
                "initialize response missing protocolVersion".into(),
            ));
        }

        let listing = self.mux.send("tools/list", json!({})).await?;

        // An absent or empty tool list is zero capabilities, not an error.
        let tools: Vec<ToolDescriptor> = match listing.get("tools") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| AppError::Proxy(format!("malformed tools/list response: {e}")))?,
            None => Vec::new(),
        };

        *self.tools.write().await = tools;
        Ok(())
    }
}

impl Default for ProxyClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── Background tasks ─────────────────────────────────────────────────────────

/// Stdout reader — frames the response stream and feeds the multiplexer.
async fn run_reader(
    stdout: ChildStdout,
    mux: Arc<RequestMux>,
    state: Arc<Mutex<SessionState>>,
    cancel: CancellationToken,
) {
    let mut framed = FramedRead::new(stdout, FrameCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        // EOF — the exit monitor owns termination handling.
                        debug!("reader: EOF on server stdout");
                        break;
                    }
                    Some(Err(AppError::Proxy(msg))) => {
                        // Oversized frame — discard it, keep the session.
                        warn!(error = %msg, "reader: framing error, skipping frame");
                    }
                    Some(Err(err)) => {
                        warn!(%err, "reader: stream error, failing session");
                        mux.fail_all(&format!("server stream error: {err}")).await;
                        *state.lock().await = SessionState::Stopped;
                        break;
                    }
                    Some(Ok(frame)) => {
                        mux.on_frame(&frame).await;
                    }
                }
            }
        }
    }
}

/// Stdin writer — serialises queued envelopes as NDJSON lines.
async fn run_writer(
    mut stdin: ChildStdin,
    mut write_rx: mpsc::Receiver<Value>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("writer: cancellation received, stopping");
                break;
            }

            msg = write_rx.recv() => {
                let Some(value) = msg else {
                    debug!("writer: request channel closed, stopping");
                    break;
                };

                let mut bytes = match serde_json::to_vec(&value) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!(%err, "writer: failed to serialise envelope, dropping");
                        continue;
                    }
                };
                bytes.push(b'\n');

                if let Err(err) = stdin.write_all(&bytes).await {
                    warn!(%err, "writer: write to server stdin failed, stopping");
                    break;
                }
            }
        }
    }
}

/// Stderr drain — diagnostic text only, never fatal.
///
/// The known startup banner is filtered out; everything else surfaces as a
/// warning attributed to the server process.
async fn run_stderr_drain(stderr: ChildStderr, cancel: CancellationToken) {
    let mut lines = BufReader::new(stderr).lines();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() && !trimmed.contains(STARTUP_BANNER) {
                            warn!(message = trimmed, "server stderr");
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(%err, "stderr drain: read error, stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// Exit monitor — on child exit, bulk-rejects pending requests with the
/// exit code and moves the session to [`SessionState::Stopped`].
async fn monitor_exit(
    mut child: Child,
    mux: Arc<RequestMux>,
    state: Arc<Mutex<SessionState>>,
    cancel: CancellationToken,
) {
    tokio::select! {
        result = child.wait() => {
            let reason = match result {
                Ok(status) => status.code().map_or_else(
                    || "server process terminated by signal".to_owned(),
                    |code| format!("server process exited with code {code}"),
                ),
                Err(err) => format!("error waiting for server process: {err}"),
            };

            warn!(reason, "proxied server terminated");
            *state.lock().await = SessionState::Stopped;
            let rejected = mux.fail_all(&reason).await;
            if rejected > 0 {
                debug!(rejected, "rejected in-flight requests on server exit");
            }
        }
        () = cancel.cancelled() => {
            // Explicit stop: kill the child; stop() handles the rejections.
            if let Err(err) = child.kill().await {
                debug!(%err, "exit monitor: kill after cancellation failed");
            }
        }
    }
}
