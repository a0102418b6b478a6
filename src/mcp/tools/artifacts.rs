//! `get_artifacts` MCP tool handler.
//!
//! Lists or downloads artifacts produced by a run via the CLI.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use serde_json::Value;

use crate::elicitation::{check_prerequisites, handle_rwx_error};
use crate::mcp::handler::{AppState, BridgeServer};
use crate::mcp::tools::util::{json_result, parse_input};
use crate::rwx_cli::{extract_run_id, run_rwx_command};

#[derive(Debug, serde::Deserialize)]
struct ArtifactsInput {
    run_id: String,
    #[serde(default)]
    download: bool,
    #[serde(default)]
    artifact_key: Option<String>,
}

/// Handle the `get_artifacts` tool call.
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
    let input: ArtifactsInput = parse_input("get_artifacts", args)?;

    if let Some(needed) = check_prerequisites(&state.access_token).await {
        return Ok(needed);
    }

    let id = extract_run_id(&input.run_id).to_owned();
    let run_url = state.config.run_url(&id);

    let mut args = vec![
        "artifacts".to_owned(),
        id.clone(),
        "--output".to_owned(),
        "json".to_owned(),
    ];
    if input.download {
        if let Some(key) = &input.artifact_key {
            args.push("--key".to_owned());
            args.push(key.clone());
        }
    } else {
        args.push("--list".to_owned());
    }

    let raw = match run_rwx_command(&args, None).await {
        Ok(raw) => raw,
        Err(err) => return Ok(handle_rwx_error(&err, "get artifacts")),
    };

    let parsed: Value = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            return Ok(handle_rwx_error(
                &crate::AppError::Cli(format!("unparsable artifacts output: {err}")),
                "get artifacts",
            ));
        }
    };

    let artifacts = parsed
        .get("artifacts")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    let count = artifacts.as_array().map_or(0, Vec::len);

    let mut response = serde_json::json!({
        "run_id": id,
        "url": run_url,
        "action": if input.download { "downloaded" } else { "listed" },
        "artifacts": artifacts,
        "count": count,
    });

    if !input.download {
        if let Some(obj) = response.as_object_mut() {
            obj.insert(
                "hint".into(),
                Value::String("Set download=true to download artifacts".into()),
            );
        }
    }

    Ok(json_result(&response))
}
