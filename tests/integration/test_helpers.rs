//! Shared helpers: shell-scripted mock MCP server processes.
//!
//! The mocks answer by request order rather than parsing JSON — the client
//! awaits each handshake response before sending the next request, so the
//! order on stdin is deterministic: `initialize` (id 1), `tools/list`
//! (id 2), then `tools/call` (id 3).

use rwx_bridge::proxy::spawner::SpawnConfig;

/// Spawn config that runs `script` through `sh -c`.
pub fn sh_config(script: &str) -> SpawnConfig {
    SpawnConfig {
        command: "sh".to_owned(),
        args: vec!["-c".to_owned(), script.to_owned()],
        working_dir: None,
    }
}

/// Standard mock: completes the handshake advertising one `echo` tool, then
/// answers a single `tools/call`. Every received line is appended to the
/// file at `capture_path` for wire-level assertions.
pub fn echo_server_script(capture_path: &str, call_response: &str) -> String {
    let template = r#"
IFS= read -r line
printf '%s\n' "$line" >> __CAPTURE__
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
IFS= read -r line
printf '%s\n' "$line" >> __CAPTURE__
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"Echo a message","inputSchema":{"type":"object","properties":{"msg":{"type":"string","description":"message to echo"}},"required":["msg"]}}]}}'
IFS= read -r line
printf '%s\n' "$line" >> __CAPTURE__
printf '%s\n' '__CALL_RESPONSE__'
sleep 2
"#;
    template
        .replace("__CAPTURE__", capture_path)
        .replace("__CALL_RESPONSE__", call_response)
}

/// Canned `tools/call` response carrying one text content item.
pub fn text_call_response(id: u64, text: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [{ "type": "text", "text": text }],
            "isError": false,
        },
    })
    .to_string()
}

/// Read the captured request lines as parsed JSON values.
pub fn read_capture(capture_path: &str) -> Vec<serde_json::Value> {
    let raw = std::fs::read_to_string(capture_path).expect("capture file exists");
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("captured line is JSON"))
        .collect()
}
