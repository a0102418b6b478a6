//! `tail_logs` MCP tool handler.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;

use crate::elicitation::handle_rwx_error;
use crate::logs::MAX_LINES_PER_PAGE;
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input};
use crate::rwx_cli::extract_run_id;

fn default_lines() -> usize {
    MAX_LINES_PER_PAGE
}

#[derive(Debug, serde::Deserialize)]
struct TailLogsInput {
    id: String,
    #[serde(default = "default_lines")]
    lines: usize,
    #[serde(default)]
    offset: usize,
}

/// Window of up to `lines` entries ending `offset` lines before the end.
///
/// `offset = 0` is the final `lines` lines; `offset = 50` the 50 before
/// those. Returns the window and whether earlier lines remain.
#[must_use]
pub fn tail_window(all_lines: &[&str], lines: usize, offset: usize) -> (Vec<String>, bool) {
    let end = all_lines.len().saturating_sub(offset);
    let start = end.saturating_sub(lines);
    let window: Vec<String> = all_lines[start..end].iter().map(|s| (*s).to_owned()).collect();
    let has_more = start > 0;
    (window, has_more)
}

/// Handle the `tail_logs` tool call.
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
    let input: TailLogsInput = parse_input("tail_logs", args)?;

    let id = extract_run_id(&input.id).to_owned();
    let num_lines = input.lines.min(MAX_LINES_PER_PAGE);

    let content = match state.logs.fetch(&id).await {
        Ok(content) => content,
        Err(err) => return Ok(handle_rwx_error(&err, "get tail logs")),
    };

    let all_lines: Vec<&str> = content.split('\n').collect();
    let (window, has_more) = tail_window(&all_lines, num_lines, input.offset);
    let lines_returned = window.len();

    Ok(json_result(&serde_json::json!({
        "id": id,
        "offset": input.offset,
        "lines_requested": num_lines,
        "lines_returned": lines_returned,
        "total_lines": all_lines.len(),
        "has_more": has_more,
        "next_offset": has_more.then_some(input.offset + lines_returned),
        "logs": window.join("\n"),
    })))
}
