//! `validate_workflow` MCP tool handler.
//!
//! Validates a workflow definition through the parser seam, from either a
//! file path or inline YAML content.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;

use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_error_result, json_result, parse_input};
use crate::workflow::{build_report, ValidationReport};

#[derive(Debug, serde::Deserialize)]
struct ValidateInput {
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

fn report_result(report: &ValidationReport) -> CallToolResult {
    if report.is_valid {
        json_result(report)
    } else {
        json_error_result(report)
    }
}

/// Handle the `validate_workflow` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` only for malformed parameters; validation
/// failures and missing files become error-flagged report results.
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
    let input: ValidateInput = parse_input("validate_workflow", args)?;

    let (file_name, source) = match (input.content, input.file_path) {
        (Some(content), _) => ("inline.yml".to_owned(), content),
        (None, Some(file_path)) => {
            let resolved = resolve_path(&file_path);
            if !resolved.exists() {
                return Ok(report_result(&ValidationReport::single_error(format!(
                    "File not found: {}",
                    resolved.display()
                ))));
            }
            match tokio::fs::read_to_string(&resolved).await {
                Ok(source) => (resolved.to_string_lossy().into_owned(), source),
                Err(err) => {
                    return Ok(report_result(&ValidationReport::single_error(format!(
                        "Failed to read {}: {err}",
                        resolved.display()
                    ))));
                }
            }
        }
        (None, None) => {
            return Ok(report_result(&ValidationReport::single_error(
                "Either file_path or content must be provided",
            )));
        }
    };

    match state
        .workflow_parser
        .parse(file_name, source, HashMap::new())
        .await
    {
        Ok(outcome) => Ok(report_result(&build_report(&outcome))),
        Err(err) => Ok(report_result(&ValidationReport::single_error(format!(
            "Validation failed: {err}"
        )))),
    }
}

fn resolve_path(file_path: &str) -> PathBuf {
    let path = PathBuf::from(file_path);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}
