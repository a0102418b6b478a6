//! `wait_for_ci_run` MCP tool handler.
//!
//! Polls the cloud API until the run completes or the timeout elapses. The
//! poll interval and timeout are caller-controlled; there is no timeout at
//! the proxy layer, so this tool is the place waiting happens.

use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tokio::time::Instant;

use crate::elicitation::{check_token, handle_rwx_error};
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input};
use crate::rwx_cli::extract_run_id;

fn default_timeout_seconds() -> u64 {
    1800
}

fn default_poll_interval_seconds() -> u64 {
    30
}

#[derive(Debug, serde::Deserialize)]
struct WaitInput {
    run_id: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_poll_interval_seconds")]
    poll_interval_seconds: u64,
}

/// Handle the `wait_for_ci_run` tool call.
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
    let input: WaitInput = parse_input("wait_for_ci_run", args)?;

    if let Some(needed) = check_token(&state.access_token).await {
        return Ok(needed);
    }

    let id = extract_run_id(&input.run_id).to_owned();
    let run_url = state.config.run_url(&id);
    let started = Instant::now();
    let deadline = started + Duration::from_secs(input.timeout_seconds);
    let mut polls: u32 = 0;

    while Instant::now() < deadline {
        polls += 1;

        let status = match state.cloud.fetch_run_status(&id).await {
            Ok(status) => status,
            Err(err) => return Ok(handle_rwx_error(&err, "wait for run")),
        };

        if status.is_complete {
            return Ok(json_result(&serde_json::json!({
                "completed": true,
                "elapsed_seconds": started.elapsed().as_secs(),
                "polls": polls,
                "run_id": id,
                "run_url": run_url,
                "status": status.outcome.as_str(),
            })));
        }

        tokio::time::sleep(Duration::from_secs(input.poll_interval_seconds)).await;
    }

    Ok(json_result(&serde_json::json!({
        "completed": false,
        "elapsed_seconds": started.elapsed().as_secs(),
        "message": format!("Run did not complete within {} seconds", input.timeout_seconds),
        "polls": polls,
        "run_id": id,
        "run_url": run_url,
        "timeout": true,
    })))
}
