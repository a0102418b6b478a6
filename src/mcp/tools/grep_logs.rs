//! `grep_logs` MCP tool handler.
//!
//! Case-insensitive pattern search over a downloaded log with context
//! lines, match markers, and page-based output windowing.

use std::collections::HashSet;
use std::sync::Arc;

use regex::RegexBuilder;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;

use crate::elicitation::handle_rwx_error;
use crate::logs::MAX_LINES_PER_PAGE;
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{error_result, json_result, parse_input};
use crate::rwx_cli::extract_run_id;

fn default_context() -> usize {
    3
}

fn default_page() -> usize {
    1
}

#[derive(Debug, serde::Deserialize)]
struct GrepLogsInput {
    id: String,
    pattern: String,
    #[serde(default = "default_context")]
    context: usize,
    #[serde(default = "default_page")]
    page: usize,
}

/// Matched output with context, before pagination.
#[derive(Debug)]
pub struct GrepOutput {
    /// Rendered lines: `>>> N: match` / `    N: context` / `---` separators.
    pub lines: Vec<String>,
    /// Number of matching log lines.
    pub matches_found: usize,
}

/// Render grep output: each match gets `context` lines on both sides,
/// overlapping windows merge, and `---` separates non-adjacent groups.
/// Line numbers are 1-based; match lines are marked with `>>>`.
#[must_use]
pub fn build_grep_output(all_lines: &[&str], pattern: &regex::Regex, context: usize) -> GrepOutput {
    let matching: Vec<usize> = all_lines
        .iter()
        .enumerate()
        .filter(|(_, line)| pattern.is_match(line))
        .map(|(idx, _)| idx)
        .collect();

    let mut output = Vec::new();
    let mut included: HashSet<usize> = HashSet::new();
    let last_match = matching.last().copied();

    for &match_idx in &matching {
        let start = match_idx.saturating_sub(context);
        let end = (match_idx + context).min(all_lines.len().saturating_sub(1));

        for idx in start..=end {
            if included.insert(idx) {
                let prefix = if idx == match_idx { ">>> " } else { "    " };
                output.push(format!("{prefix}{}: {}", idx + 1, all_lines[idx]));
            }
        }

        if Some(match_idx) != last_match {
            output.push("---".to_owned());
        }
    }

    GrepOutput {
        lines: output,
        matches_found: matching.len(),
    }
}

/// Handle the `grep_logs` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` only for malformed parameters; an invalid
/// pattern becomes an error-flagged text result.
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
    let input: GrepLogsInput = parse_input("grep_logs", args)?;

    let id = extract_run_id(&input.id).to_owned();
    let page = input.page.max(1);

    let pattern = match RegexBuilder::new(&input.pattern)
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(err) => return Ok(error_result(format!("Failed to grep logs: {err}"))),
    };

    let content = match state.logs.fetch(&id).await {
        Ok(content) => content,
        Err(err) => return Ok(handle_rwx_error(&err, "grep logs")),
    };

    let all_lines: Vec<&str> = content.split('\n').collect();
    let output = build_grep_output(&all_lines, &pattern, input.context);

    let start_line = (page - 1) * MAX_LINES_PER_PAGE;
    let end_line = (start_line + MAX_LINES_PER_PAGE).min(output.lines.len());
    let paginated: &[String] = output.lines.get(start_line..end_line).unwrap_or(&[]);
    let total_pages = output.lines.len().div_ceil(MAX_LINES_PER_PAGE);
    let has_more = page < total_pages;

    Ok(json_result(&serde_json::json!({
        "id": id,
        "pattern": input.pattern,
        "context": input.context,
        "matches_found": output.matches_found,
        "total_lines": all_lines.len(),
        "page": page,
        "total_pages": total_pages,
        "has_more": has_more,
        "next_page": has_more.then_some(page + 1),
        "logs": paginated.join("\n"),
    })))
}
