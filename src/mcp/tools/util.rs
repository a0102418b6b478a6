//! Shared utilities for MCP tool handlers.

use rmcp::model::{CallToolResult, Content};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Deserialize a tool's arguments map into its typed input struct.
///
/// # Errors
///
/// Returns `rmcp::ErrorData::invalid_params` naming the tool when the
/// arguments do not match the expected shape.
pub fn parse_input<T: DeserializeOwned>(
    tool: &str,
    args: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<T, rmcp::ErrorData> {
    serde_json::from_value(serde_json::Value::Object(args.unwrap_or_default())).map_err(|err| {
        rmcp::ErrorData::invalid_params(format!("invalid {tool} parameters: {err}"), None)
    })
}

/// Render `value` as a pretty-printed JSON text result.
#[must_use]
pub fn json_result<T: Serialize>(value: &T) -> CallToolResult {
    let text = serde_json::to_string_pretty(value)
        .unwrap_or_else(|err| format!("failed to serialize response: {err}"));
    CallToolResult::success(vec![Content::text(text)])
}

/// Render `value` as a pretty-printed JSON text result flagged as an error.
#[must_use]
pub fn json_error_result<T: Serialize>(value: &T) -> CallToolResult {
    let text = serde_json::to_string_pretty(value)
        .unwrap_or_else(|err| format!("failed to serialize response: {err}"));
    CallToolResult::error(vec![Content::text(text)])
}

/// Render a plain error message as an error-flagged text result.
#[must_use]
pub fn error_result(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

/// Truncate `text` to at most `max_len` bytes, breaking at the nearest
/// preceding char boundary so the result is always valid UTF-8.
#[must_use]
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_owned();
    }

    let boundary = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_len)
        .last()
        .unwrap_or(0);
    text[..boundary].to_owned()
}
