//! `compare_runs` MCP tool handler.
//!
//! Builds a Honeycomb query comparing task durations across two runs.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use serde_json::json;

use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input};
use crate::rwx_cli::extract_run_id;

/// Query window for cross-run comparisons: one week.
const COMPARE_QUERY_RANGE_SECONDS: u64 = 604_800;

#[derive(Debug, serde::Deserialize)]
struct CompareInput {
    run_id_1: String,
    run_id_2: String,
}

/// Handle the `compare_runs` tool call.
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
#[allow(clippy::unused_async)] // Signature matches the shared tool dispatch table.
pub async fn run(
    state: &Arc<AppState>,
    args: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let input: CompareInput = parse_input("compare_runs", args)?;

    let id1 = extract_run_id(&input.run_id_1).to_owned();
    let id2 = extract_run_id(&input.run_id_2).to_owned();
    let honeycomb = &state.config.honeycomb;

    Ok(json_result(&json!({
        "description": format!("Compare runs {id1} vs {id2}"),
        "tool": "mcp__honeycomb__run_query",
        "analysis_tip": "Group results by task name to compare duration differences",
        "params": {
            "dataset_slug": honeycomb.dataset,
            "environment_slug": honeycomb.environment,
            "query_spec": {
                "breakdowns": ["cicd.pipeline.run.id", "cicd.pipeline.task.name"],
                "calculations": [{ "column": "duration_ms", "op": "MAX" }],
                "filters": [
                    { "column": "cicd.pipeline.run.id", "op": "in", "value": [id1, id2] },
                ],
                "time_range": COMPARE_QUERY_RANGE_SECONDS,
            },
        },
    })))
}
