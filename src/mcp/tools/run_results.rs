//! `get_run_results` MCP tool handler.
//!
//! Fetches per-task results through the CLI and categorizes them by status.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use serde::Deserialize;

use crate::elicitation::{check_prerequisites, handle_rwx_error};
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input};
use crate::rwx_cli::{extract_run_id, run_rwx_command};
use crate::AppError;

#[derive(Debug, serde::Deserialize)]
struct ResultsInput {
    run_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct TaskResult {
    #[serde(default)]
    key: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_hit: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ResultsOutput {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    execution: Option<String>,
    #[serde(default)]
    tasks: Vec<TaskResult>,
    #[serde(default)]
    duration_seconds: Option<f64>,
}

/// Handle the `get_run_results` tool call.
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
    let input: ResultsInput = parse_input("get_run_results", args)?;

    if let Some(needed) = check_prerequisites(&state.access_token).await {
        return Ok(needed);
    }

    let id = extract_run_id(&input.run_id).to_owned();

    match fetch_results(&id).await {
        Ok(parsed) => {
            let failed: Vec<&TaskResult> = parsed
                .tasks
                .iter()
                .filter(|task| status_is(task, "failed"))
                .collect();
            let succeeded = parsed
                .tasks
                .iter()
                .filter(|task| status_is(task, "succeeded"))
                .count();
            let skipped = parsed
                .tasks
                .iter()
                .filter(|task| status_is(task, "skipped"))
                .count();
            let cached = parsed
                .tasks
                .iter()
                .filter(|task| task.cache_hit == Some(true))
                .count();

            let status = match parsed.result.as_deref().map(str::to_lowercase).as_deref() {
                Some("succeeded") => "success".to_owned(),
                Some("failed") => "failure".to_owned(),
                Some(other) => other.to_owned(),
                None => "unknown".to_owned(),
            };

            Ok(json_result(&serde_json::json!({
                "run_id": id,
                "url": state.config.run_url(&id),
                "status": status,
                "execution": parsed.execution,
                "duration_seconds": parsed.duration_seconds,
                "summary": {
                    "total": parsed.tasks.len(),
                    "succeeded": succeeded,
                    "failed": failed.len(),
                    "skipped": skipped,
                    "cached": cached,
                },
                "failed_tasks": failed.iter().map(|task| task.key.clone()).collect::<Vec<_>>(),
                "tasks": parsed.tasks,
            })))
        }
        Err(err) => Ok(handle_rwx_error(&err, "get run results")),
    }
}

fn status_is(task: &TaskResult, wanted: &str) -> bool {
    task.status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case(wanted))
}

async fn fetch_results(id: &str) -> crate::Result<ResultsOutput> {
    let raw = run_rwx_command(
        &[
            "results".to_owned(),
            id.to_owned(),
            "--output".to_owned(),
            "json".to_owned(),
        ],
        None,
    )
    .await?;

    serde_json::from_str(&raw).map_err(|e| AppError::Cli(format!("unparsable results output: {e}")))
}
