//! Unit tests for the capability forwarding layer's pure pieces: schema
//! conversion into local tool definitions and CLI reference rewriting.

use serde_json::{json, Value};

use rwx_bridge::mcp::proxy_tool::{local_tool, rewrite_result_value};
use rwx_bridge::proxy::ToolDescriptor;

fn descriptor(schema: Value) -> ToolDescriptor {
    serde_json::from_value(json!({
        "name": "echo",
        "description": "Echo a message",
        "inputSchema": schema,
    }))
    .expect("descriptor parses")
}

#[test]
fn local_tool_carries_name_description_and_converted_schema() {
    let tool = local_tool(&descriptor(json!({
        "properties": {
            "msg": { "type": "string", "description": "message to echo" },
            "loud": { "type": "boolean" }
        },
        "required": ["msg"]
    })));

    assert_eq!(tool.name.as_ref(), "echo");
    assert_eq!(tool.description.as_deref(), Some("Echo a message"));

    let schema = tool.input_schema.as_ref();
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["msg"]["type"], "string");
    assert_eq!(schema["properties"]["loud"]["type"], "boolean");
    // `loud` is absent from required, so it stays optional.
    assert_eq!(schema["required"], json!(["msg"]));
}

#[test]
fn descriptor_without_schema_still_registers() {
    let raw: ToolDescriptor =
        serde_json::from_value(json!({ "name": "bare" })).expect("descriptor parses");
    let tool = local_tool(&raw);

    assert_eq!(tool.name.as_ref(), "bare");
    assert!(tool.description.is_none());
    assert_eq!(tool.input_schema.as_ref()["type"], "object");
}

#[test]
fn text_content_is_rewritten_in_place() {
    let raw = json!({
        "content": [
            { "type": "text", "text": "Run `rwx run` first, then rwx results." },
            { "type": "image", "data": "...", "mimeType": "image/png" }
        ],
        "isError": false
    });

    let rewritten = rewrite_result_value(raw);
    assert_eq!(
        rewritten["content"][0]["text"],
        "Run `launch_ci_run` first, then get_run_results."
    );
    // Non-text items pass through untouched.
    assert_eq!(rewritten["content"][1]["type"], "image");
}

#[test]
fn results_without_content_arrays_pass_through() {
    let raw = json!({ "ok": true });
    assert_eq!(rewrite_result_value(raw.clone()), raw);
}
