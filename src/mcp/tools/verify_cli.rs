//! `verify_rwx_cli` MCP tool handler.
//!
//! Re-checks the CLI prerequisite on demand — typically called after the
//! user confirms an install or upgrade prompted by an elicitation.

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;

use crate::elicitation::cli_install_elicitation;
use crate::mcp::handler::BridgeServer;
use crate::mcp::tools::util::json_result;
use crate::rwx_cli::{cli_status, CliStatus};

/// Handle the `verify_rwx_cli` tool call.
///
/// The `confirmed` input is accepted but unused — probing the binary is the
/// source of truth.
///
/// # Errors
///
/// Never returns `rmcp::ErrorData`; all outcomes are data.
pub async fn handle(
    _context: ToolCallContext<'_, BridgeServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    probe().await
}

/// Execute the probe; entry point for the local `call` CLI.
///
/// # Errors
///
/// Never returns `rmcp::ErrorData`; all outcomes are data.
pub async fn probe() -> Result<CallToolResult, rmcp::ErrorData> {
    match cli_status().await {
        CliStatus::Installed {
            version,
            meets_minimum: true,
        } => Ok(json_result(&serde_json::json!({
            "status": "success",
            "message": format!("rwx CLI version {version} is installed and ready."),
            "hint": "You can now proceed with your previous request.",
        }))),
        CliStatus::Installed { version, .. } => {
            Ok(cli_install_elicitation(Some(&version.to_string())))
        }
        CliStatus::NotInstalled => Ok(cli_install_elicitation(None)),
    }
}
