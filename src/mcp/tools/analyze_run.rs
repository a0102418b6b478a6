//! `analyze_ci_run` MCP tool handler.
//!
//! Pure data shaping: builds the Honeycomb query payloads and the failure
//! classification guide the hosting agent follows to analyze a run. No
//! network traffic happens here.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use serde_json::{json, Value};

use crate::config::HoneycombConfig;
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input};
use crate::rwx_cli::extract_run_id;

/// Query window for single-run lookups: one day.
const RUN_QUERY_RANGE_SECONDS: u64 = 86_400;

#[derive(Debug, serde::Deserialize)]
struct AnalyzeInput {
    run_id: String,
}

/// Honeycomb query for the full task overview of one run.
#[must_use]
pub fn overview_query(honeycomb: &HoneycombConfig, run_id: &str) -> Value {
    json!({
        "dataset_slug": honeycomb.dataset,
        "environment_slug": honeycomb.environment,
        "query_spec": {
            "breakdowns": [
                "cicd.pipeline.task.name",
                "cicd.pipeline.task.run.result",
                "cicd.pipeline.task.run.execution.status",
                "cicd.pipeline.task.run.execution.reason",
            ],
            "calculations": [{ "op": "COUNT" }, { "column": "duration_ms", "op": "MAX" }],
            "filters": [{ "column": "cicd.pipeline.run.id", "op": "=", "value": run_id }],
            "time_range": RUN_QUERY_RANGE_SECONDS,
        },
    })
}

/// Honeycomb query narrowing to failed tasks with their run URLs.
#[must_use]
pub fn failed_tasks_query(honeycomb: &HoneycombConfig, run_id: &str) -> Value {
    json!({
        "dataset_slug": honeycomb.dataset,
        "environment_slug": honeycomb.environment,
        "query_spec": {
            "breakdowns": [
                "cicd.pipeline.task.name",
                "cicd.pipeline.task.run.url.full",
            ],
            "calculations": [{ "op": "COUNT" }, { "column": "duration_ms", "op": "MAX" }],
            "filters": [
                { "column": "cicd.pipeline.run.id", "op": "=", "value": run_id },
                { "column": "cicd.pipeline.task.run.result", "op": "=", "value": "failure" },
            ],
            "time_range": RUN_QUERY_RANGE_SECONDS,
        },
    })
}

/// Honeycomb query ordering tasks by duration, slowest first.
#[must_use]
pub fn performance_query(honeycomb: &HoneycombConfig, run_id: &str) -> Value {
    json!({
        "dataset_slug": honeycomb.dataset,
        "environment_slug": honeycomb.environment,
        "query_spec": {
            "breakdowns": ["cicd.pipeline.task.name"],
            "calculations": [{ "column": "duration_ms", "op": "MAX" }],
            "filters": [{ "column": "cicd.pipeline.run.id", "op": "=", "value": run_id }],
            "orders": [{ "column": "duration_ms", "op": "MAX", "order": "descending" }],
            "time_range": RUN_QUERY_RANGE_SECONDS,
        },
    })
}

/// Handle the `analyze_ci_run` tool call.
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
    let input: AnalyzeInput = parse_input("analyze_ci_run", args)?;

    let id = extract_run_id(&input.run_id).to_owned();
    let honeycomb = &state.config.honeycomb;

    Ok(json_result(&json!({
        "analysis_steps": [
            {
                "step": 1,
                "tool": "mcp__honeycomb__run_query",
                "action": "Get run overview",
                "purpose": "See all tasks, their results, and execution status",
                "params": overview_query(honeycomb, &id),
            },
            {
                "step": 2,
                "tool": "mcp__honeycomb__run_query",
                "action": "Get failed tasks",
                "purpose": "Identify which specific tasks failed",
                "params": failed_tasks_query(honeycomb, &id),
            },
            {
                "step": 3,
                "tool": "mcp__rwx__get_run_test_failures",
                "action": "Get test failures (if test task failed)",
                "purpose": "Get detailed test failure information",
                "params": { "run_urls": [id] },
            },
        ],
        "failure_classification_guide": {
            "build_failure": "cicd.pipeline.task.name is 'build' AND result=failure",
            "early_failure": "Only setup tasks ran (code, node-modules) before failure",
            "infrastructure": "execution.reason mentions docker/network/resource issues",
            "test_failure": "cicd.pipeline.task.name contains 'test' AND result=failure",
            "timeout": "execution.status=aborted AND execution.reason=cancelled",
        },
        "performance_query": performance_query(honeycomb, &id),
        "run_id": id,
        "run_url": state.config.run_url(&id),
    })))
}
