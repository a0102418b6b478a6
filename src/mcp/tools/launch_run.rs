//! `launch_ci_run` MCP tool handler.
//!
//! Launches a CI run for a git ref through the `rwx` CLI and reports the
//! run id and cloud URL.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use serde_json::Value;
use tracing::info;

use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{error_result, json_result, parse_input};
use crate::rwx_cli::run_rwx_command;

#[derive(Debug, serde::Deserialize)]
struct LaunchInput {
    /// Git ref (branch name or commit SHA).
    #[serde(rename = "ref")]
    git_ref: String,
    /// Specific tasks to target.
    #[serde(default)]
    targets: Vec<String>,
}

/// Handle the `launch_ci_run` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` only for malformed parameters; launch failures
/// become error-flagged text results.
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
    let input: LaunchInput = parse_input("launch_ci_run", args)?;

    let mut args = vec![
        "run".to_owned(),
        state.config.workflow_path.clone(),
        "--ref".to_owned(),
        input.git_ref.clone(),
        "--json".to_owned(),
    ];
    for target in &input.targets {
        args.push("--target".to_owned());
        args.push(target.clone());
    }

    let raw = match run_rwx_command(&args, None).await {
        Ok(raw) => raw,
        Err(err) => return Ok(error_result(format!("Failed to launch: {err}"))),
    };

    let parsed: Value = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => return Ok(error_result(format!("Failed to launch: {err}"))),
    };

    let run_id = parsed.get("run_id").and_then(Value::as_str).unwrap_or("");
    let url = parsed.get("url").and_then(Value::as_str).unwrap_or("");

    info!(run_id, git_ref = %input.git_ref, "CI run launched");

    Ok(json_result(&serde_json::json!({
        "next_step": "Use analyze_ci_run with this run_id to monitor progress",
        "run_id": run_id,
        "status": "launched",
        "url": url,
    })))
}
