//! Needs-user-input elicitation responses.
//!
//! When a prerequisite is missing (access token, CLI installation) a tool
//! answers with a structured elicitation instead of an error: the hosting
//! agent displays the question, collects input per `input_schema`, calls
//! `next_tool` with it, and then retries the original tool.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::AccessToken;
use crate::rwx_cli::{cli_status, CliStatus, MIN_RWX_VERSION};
use crate::AppError;

/// Elicitation payload rendered as the tool result body.
#[derive(Debug, Clone, Serialize)]
pub struct ElicitationResponse {
    /// Always `needs_user_input`.
    pub status: &'static str,
    /// Always `elicitation`.
    pub kind: &'static str,
    /// Question shown to the user.
    pub question: String,
    /// Step-by-step instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Shape of the input to collect.
    pub input_schema: Value,
    /// Tool to call with the collected input.
    pub next_tool: &'static str,
    /// Extra inputs to pass along to `next_tool`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_tool_inputs: Option<Value>,
}

impl ElicitationResponse {
    /// Render as a pretty-printed JSON text result.
    #[must_use]
    pub fn into_result(self) -> CallToolResult {
        let text = serde_json::to_string_pretty(&self)
            .unwrap_or_else(|_| format!("{}: {}", self.status, self.question));
        CallToolResult::success(vec![Content::text(text)])
    }
}

/// Elicitation prompting for the RWX access token.
#[must_use]
pub fn access_token_elicitation() -> CallToolResult {
    ElicitationResponse {
        status: "needs_user_input",
        kind: "elicitation",
        question: "RWX access token is required. Please provide your RWX access token."
            .to_owned(),
        instructions: Some(
            "To get an RWX access token:\n\
             1. Go to https://cloud.rwx.com/settings/access-tokens\n\
             2. Click \"Create Access Token\"\n\
             3. Give it a descriptive name (e.g., \"MCP Plugin\")\n\
             4. Copy the generated token\n\n\
             The token will be stored for this session only."
                .to_owned(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "token": { "type": "string", "description": "Your RWX access token" }
            },
            "required": ["token"]
        }),
        next_tool: "set_rwx_access_token",
        next_tool_inputs: None,
    }
    .into_result()
}

/// Elicitation for an invalid or expired token (401 from the API).
#[must_use]
pub fn invalid_token_elicitation() -> CallToolResult {
    ElicitationResponse {
        status: "needs_user_input",
        kind: "elicitation",
        question:
            "RWX access token is invalid or expired. Please provide a new RWX access token."
                .to_owned(),
        instructions: Some(
            "Your current RWX access token was rejected (401 Unauthorized).\n\n\
             To get a new RWX access token:\n\
             1. Go to https://cloud.rwx.com/settings/access-tokens\n\
             2. Click \"Create Access Token\"\n\
             3. Give it a descriptive name (e.g., \"MCP Plugin\")\n\
             4. Copy the generated token\n\n\
             The token will be stored for this session only."
                .to_owned(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "token": { "type": "string", "description": "Your RWX access token" }
            },
            "required": ["token"]
        }),
        next_tool: "set_rwx_access_token",
        next_tool_inputs: None,
    }
    .into_result()
}

/// Elicitation prompting to install or upgrade the `rwx` CLI.
#[must_use]
pub fn cli_install_elicitation(current_version: Option<&str>) -> CallToolResult {
    let question = match current_version {
        Some(version) => format!(
            "rwx CLI version {version} is installed, but version >= {MIN_RWX_VERSION} is \
             required. Please upgrade."
        ),
        None => format!("rwx CLI is not installed. Please install version >= {MIN_RWX_VERSION}."),
    };

    ElicitationResponse {
        status: "needs_user_input",
        kind: "elicitation",
        question,
        instructions: Some(
            "To install or upgrade the rwx CLI:\n\n\
             **Download from releases:**\n\
             https://github.com/rwx-research/rwx-cli/releases\n\n\
             **Or install via package manager:**\n\n\
             macOS (Homebrew):\n  brew install rwx-research/tap/rwx\n\n\
             Linux (apt):\n  \
             curl -fsSL https://apt.rwx.com/public.key | sudo gpg --dearmor -o \
             /usr/share/keyrings/rwx-archive-keyring.gpg\n  \
             echo \"deb [signed-by=/usr/share/keyrings/rwx-archive-keyring.gpg] \
             https://apt.rwx.com stable main\" | sudo tee /etc/apt/sources.list.d/rwx.list\n  \
             sudo apt update && sudo apt install rwx\n\n\
             After installation, confirm by running: rwx --version"
                .to_owned(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "confirmed": {
                    "type": "string",
                    "description": "Type \"installed\" after you have installed/upgraded the rwx CLI",
                    "enum": ["installed"]
                }
            },
            "required": ["confirmed"]
        }),
        next_tool: "verify_rwx_cli",
        next_tool_inputs: None,
    }
    .into_result()
}

/// Check the CLI prerequisite: installed and at least the minimum version.
///
/// Returns the elicitation to surface when the CLI is not ready.
pub async fn check_cli() -> Option<CallToolResult> {
    match cli_status().await {
        CliStatus::Installed {
            meets_minimum: true,
            ..
        } => None,
        CliStatus::Installed { version, .. } => {
            Some(cli_install_elicitation(Some(&version.to_string())))
        }
        CliStatus::NotInstalled => Some(cli_install_elicitation(None)),
    }
}

/// Check the token prerequisite.
pub async fn check_token(token: &AccessToken) -> Option<CallToolResult> {
    if token.is_set().await {
        None
    } else {
        Some(access_token_elicitation())
    }
}

/// Check all prerequisites: CLI first, then token.
///
/// Returns the first elicitation needed, or `None` when everything is ready.
pub async fn check_prerequisites(token: &AccessToken) -> Option<CallToolResult> {
    if let Some(needed) = check_cli().await {
        return Some(needed);
    }
    check_token(token).await
}

/// Whether an error looks like a 401 Unauthorized from the cloud API.
#[must_use]
pub fn is_401_error(err: &AppError) -> bool {
    let text = err.to_string();
    text.contains("401") || text.contains("Unauthorized")
}

/// Convert a tool failure into its user-visible result.
///
/// 401s elicit a fresh token; everything else becomes an error-flagged text
/// result, so a failed outcome is always ordinary data, never a raw fault.
#[must_use]
pub fn handle_rwx_error(err: &AppError, operation: &str) -> CallToolResult {
    if is_401_error(err) {
        return invalid_token_elicitation();
    }

    CallToolResult::error(vec![Content::text(format!("Failed to {operation}: {err}"))])
}
