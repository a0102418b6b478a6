//! `set_rwx_access_token` MCP tool handler.
//!
//! Writes the session-owned token slot. The process environment is never
//! mutated; everything that needs the token reads the shared slot.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::info;

use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{error_result, json_result, parse_input};

#[derive(Debug, serde::Deserialize)]
struct SetTokenInput {
    token: String,
}

/// Handle the `set_rwx_access_token` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` only for malformed parameters.
pub async fn handle(
    context: ToolCallContext<'_, BridgeServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let state = Arc::clone(context.service.state());
    run(&state, context.arguments).await
}

/// Execute against shared state; entry point for the local `call` CLI.
///
/// # Errors
///
/// Same contract as [`handle`].
pub async fn run(
    state: &Arc<AppState>,
    args: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let input: SetTokenInput = parse_input("set_rwx_access_token", args)?;

    let token = input.token.trim();
    if token.is_empty() {
        return Ok(error_result("Error: Token cannot be empty."));
    }

    state.access_token.set(token).await;
    info!("RWX access token updated for this session");

    Ok(json_result(&serde_json::json!({
        "status": "success",
        "message": "RWX access token configured successfully for this session.",
        "hint": "You can now proceed with your previous request.",
    })))
}
