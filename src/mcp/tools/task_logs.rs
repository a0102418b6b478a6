//! `get_task_logs` MCP tool handler.
//!
//! Downloads full logs for a task and pulls out failure highlights so the
//! caller can triage without reading the whole body.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;

use crate::elicitation::handle_rwx_error;
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input, truncate_text};
use crate::rwx_cli::extract_run_id;

/// Cap on the raw log body included in the response.
const MAX_LOG_BYTES: usize = 100_000;

/// Highlights returned before the body; enough to spot the failure.
const MAX_HIGHLIGHTS: usize = 20;

#[derive(Debug, serde::Deserialize)]
struct TaskLogsInput {
    task_id: String,
}

/// Lines that look like failures: case-insensitive error/fail markers and
/// the test-runner cross glyph.
#[must_use]
pub fn failure_highlights(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| {
            let lowered = line.to_lowercase();
            lowered.contains("error")
                || lowered.contains("fail")
                || line.contains('\u{2715}')
                || line.contains("FAIL")
        })
        .take(MAX_HIGHLIGHTS)
        .map(str::to_owned)
        .collect()
}

/// Handle the `get_task_logs` tool call.
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
    let input: TaskLogsInput = parse_input("get_task_logs", args)?;

    let id = extract_run_id(&input.task_id).to_owned();

    let content = match state.logs.fetch(&id).await {
        Ok(content) => content,
        Err(err) => return Ok(handle_rwx_error(&err, "get task logs")),
    };

    let highlights = failure_highlights(&content);
    let exit_code = if highlights.is_empty() { "0" } else { "1" };

    Ok(json_result(&serde_json::json!({
        "exit_code": exit_code,
        "failure_highlights": highlights,
        "logs": truncate_text(&content, MAX_LOG_BYTES),
        "task_id": id,
    })))
}
