//! `get_recent_runs` MCP tool handler.
//!
//! Lists recent runs for a branch, filtered to the configured workflow
//! definition. The API is queried for more entries than requested since the
//! branch filter is applied client-side.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;

use crate::cloud::RunListItem;
use crate::elicitation::{check_token, handle_rwx_error};
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input};

fn default_limit() -> u32 {
    5
}

#[derive(Debug, serde::Deserialize)]
struct RecentRunsInput {
    /// Branch name to filter runs by.
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

/// Map execution/result status strings to the coarse tool-facing status.
#[must_use]
pub fn map_run_status(execution_status: &str, result_status: Option<&str>) -> String {
    if execution_status != "finished" {
        return "running".to_owned();
    }
    match result_status.map(str::to_lowercase).as_deref() {
        Some("succeeded") => "success".to_owned(),
        Some("failed") => "failure".to_owned(),
        Some(other) if !other.is_empty() => other.to_owned(),
        _ => "unknown".to_owned(),
    }
}

/// Handle the `get_recent_runs` tool call.
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
    let input: RecentRunsInput = parse_input("get_recent_runs", args)?;

    if let Some(needed) = check_token(&state.access_token).await {
        return Ok(needed);
    }

    // Over-fetch: the branch filter happens client-side.
    let fetch_limit = (input.limit.saturating_mul(10)).min(100);

    let listed = match state.cloud.list_runs(fetch_limit).await {
        Ok(listed) => listed,
        Err(err) => return Ok(handle_rwx_error(&err, "get recent runs")),
    };

    let filtered: Vec<&RunListItem> = listed
        .iter()
        .filter(|run| {
            run.branch.as_deref() == Some(input.git_ref.as_str())
                && run.definition_path == state.config.workflow_path
        })
        .take(input.limit as usize)
        .collect();

    let runs: Vec<serde_json::Value> = filtered
        .iter()
        .map(|run| {
            serde_json::json!({
                "run_id": run.id,
                "status": map_run_status(&run.execution_status, run.result_status.as_deref()),
                "commit_sha": run.commit_sha,
                "title": run.title,
                "url": state.config.run_url(&run.id),
            })
        })
        .collect();

    Ok(json_result(&serde_json::json!({
        "ref": input.git_ref,
        "count": runs.len(),
        "runs": runs,
    })))
}
