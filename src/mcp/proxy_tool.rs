//! Capability forwarding for proxied tools.
//!
//! Every tool discovered on the proxied server during startup is re-exposed
//! locally: its JSON Schema input shape is converted field-by-field into the
//! local validation representation, and invocations forward `(name, args)`
//! verbatim to the proxy session. All proxied tools share this one
//! forwarding behavior; the per-tool state is just the captured name.

use rmcp::model::{CallToolResult, Content};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::proxy::{ProxyClient, ToolDescriptor};

/// Primitive kinds recognized in a remote tool's input schema.
///
/// The exhaustive tag mapping lives here — the one place silent type loss
/// could occur when translating the remote schema to the local shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// `string`
    Text,
    /// `number` / `integer`
    Number,
    /// `boolean`
    Boolean,
    /// `array`
    List,
    /// `object`
    Object,
    /// Anything else — accepted without a type constraint.
    Unknown,
}

impl SchemaKind {
    /// Classify a JSON Schema `type` tag.
    #[must_use]
    pub fn from_type_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("string") => Self::Text,
            Some("number" | "integer") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::List,
            Some("object") => Self::Object,
            _ => Self::Unknown,
        }
    }

    /// Render as a local JSON Schema fragment.
    #[must_use]
    pub fn to_schema_fragment(self) -> Value {
        match self {
            Self::Text => json!({ "type": "string" }),
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::List => json!({ "type": "array", "items": {} }),
            Self::Object => json!({ "type": "object", "additionalProperties": {} }),
            Self::Unknown => json!({}),
        }
    }
}

/// Convert a remote tool's input schema into the local validation shape.
///
/// Each property is mapped through [`SchemaKind`]; descriptions are
/// preserved; properties absent from the remote `required` list stay
/// optional (JSON Schema's default). Non-object or missing schemas produce
/// an unconstrained object.
#[must_use]
pub fn convert_input_schema(remote: &Value) -> Map<String, Value> {
    let mut properties = Map::new();

    if let Some(remote_props) = remote.get("properties").and_then(Value::as_object) {
        for (key, prop) in remote_props {
            let kind = SchemaKind::from_type_tag(prop.get("type").and_then(Value::as_str));
            let mut fragment = kind.to_schema_fragment();

            if let Some(description) = prop.get("description").and_then(Value::as_str) {
                if let Some(obj) = fragment.as_object_mut() {
                    obj.insert("description".into(), Value::String(description.to_owned()));
                }
            }

            properties.insert(key.clone(), fragment);
        }
    }

    let required = remote
        .get("required")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    schema.insert("required".into(), required);
    schema
}

// ── Reference rewriting ──────────────────────────────────────────────────────

/// CLI sub-command → locally registered tool name.
///
/// Backtick-quoted snippets are rewritten before bare mentions so a quoted
/// command is never processed twice.
const CLI_REFERENCE_MAP: &[(&str, &str)] = &[
    ("rwx run", "launch_ci_run"),
    ("rwx results", "get_run_results"),
    ("rwx artifacts", "get_artifacts"),
    ("rwx lint", "validate_workflow"),
    ("rwx logs", "get_task_logs"),
];

/// Rewrite `rwx` CLI sub-command mentions into local tool names.
#[must_use]
pub fn rewrite_cli_references(text: &str) -> String {
    let mut rewritten = text.to_owned();

    // Quoted snippets first.
    for (command, tool) in CLI_REFERENCE_MAP {
        rewritten = rewritten.replace(&format!("`{command}`"), &format!("`{tool}`"));
    }
    // Then bare mentions; already-rewritten snippets no longer match.
    for (command, tool) in CLI_REFERENCE_MAP {
        rewritten = rewritten.replace(command, tool);
    }

    rewritten
}

/// Apply [`rewrite_cli_references`] to every text content item in a raw
/// tool-result value.
#[must_use]
pub fn rewrite_result_value(mut value: Value) -> Value {
    if let Some(items) = value.get_mut("content").and_then(Value::as_array_mut) {
        for item in items {
            let is_text = item.get("type").and_then(Value::as_str) == Some("text");
            if !is_text {
                continue;
            }
            if let Some(text) = item.get("text").and_then(Value::as_str) {
                let rewritten = rewrite_cli_references(text);
                if let Some(obj) = item.as_object_mut() {
                    obj.insert("text".into(), Value::String(rewritten));
                }
            }
        }
    }
    value
}

// ── Forwarding ───────────────────────────────────────────────────────────────

/// Forward a call to the proxied server and adapt its result.
///
/// The subprocess result is returned unmodified when it already has the
/// standard result shape; otherwise it is wrapped as raw JSON text. A failed
/// forward becomes a single-item error-flagged text result — the error never
/// propagates outward.
pub async fn forward(
    client: &ProxyClient,
    name: &str,
    args: Map<String, Value>,
    rewrite_references: bool,
) -> CallToolResult {
    match client.call(name, Value::Object(args)).await {
        Ok(raw) => {
            let raw = if rewrite_references {
                rewrite_result_value(raw)
            } else {
                raw
            };

            match serde_json::from_value::<CallToolResult>(raw.clone()) {
                Ok(result) => result,
                Err(err) => {
                    debug!(tool = name, %err, "result not in standard shape, wrapping as text");
                    CallToolResult::success(vec![Content::text(raw.to_string())])
                }
            }
        }
        Err(err) => CallToolResult::error(vec![Content::text(format!(
            "Error calling {name}: {err}"
        ))]),
    }
}

/// Build the local tool definition for a remote descriptor.
#[must_use]
pub fn local_tool(descriptor: &ToolDescriptor) -> rmcp::model::Tool {
    rmcp::model::Tool {
        name: descriptor.name.clone().into(),
        description: descriptor.description.clone().map(Into::into),
        input_schema: std::sync::Arc::new(convert_input_schema(&descriptor.input_schema)),
        output_schema: None,
        annotations: None,
        title: None,
        icons: None,
        meta: None,
    }
}
