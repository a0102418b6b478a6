//! Stdio transport setup.
//!
//! Wires [`BridgeServer`] to stdin/stdout for direct invocation by agentic
//! IDEs (Claude Code, GitHub Copilot CLI, Cursor, VS Code). Logging goes to
//! stderr so stdout stays clean for the MCP frames.

use rmcp::service::ServiceExt;
use rmcp::transport::io::stdio;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::handler::BridgeServer;
use crate::{AppError, Result};

/// Serve the MCP server over stdio until the cancellation token fires.
///
/// # Errors
///
/// Returns `AppError::Mcp` if the transport fails to initialize or the
/// service errors while running.
pub async fn serve_stdio(server: BridgeServer, ct: CancellationToken) -> Result<()> {
    let transport = stdio();

    info!("starting stdio MCP transport");
    let service = server
        .serve_with_ct(transport, ct)
        .await
        .map_err(|err| AppError::Mcp(format!("stdio transport failed: {err}")))?;

    service
        .waiting()
        .await
        .map_err(|err| AppError::Mcp(format!("stdio service error: {err}")))?;

    info!("stdio MCP transport shut down");
    Ok(())
}
