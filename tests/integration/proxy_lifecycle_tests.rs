//! Integration tests for the proxy session lifecycle against scripted mock
//! server processes.
//!
//! Covers:
//! - handshake ordering: exactly one `initialize` before `tools/list`, and
//!   `call` gated until both complete
//! - a handshake response without `protocolVersion` fails `start`
//! - zero advertised tools is accepted
//! - end-to-end: discovered `echo` tool, wire shape of `tools/call`, and
//!   result delivery
//! - process exit embeds the exit code and stops the session
//! - `stop` is idempotent and safe before `start`

use serde_json::json;

use rwx_bridge::proxy::{ProxyClient, SessionState};
use rwx_bridge::AppError;

use super::test_helpers::{echo_server_script, read_capture, sh_config, text_call_response};

fn capture_file(name: &str) -> String {
    let path = std::env::temp_dir().join(format!("rwx-bridge-test-{name}-{}", std::process::id()));
    let path = path.to_string_lossy().into_owned();
    // Stale files from a previous run would pollute the capture.
    let _ = std::fs::remove_file(&path);
    path
}

#[tokio::test]
async fn end_to_end_echo_session() {
    let capture = capture_file("e2e");
    let script = echo_server_script(&capture, &text_call_response(3, "echo: hi"));

    let client = ProxyClient::new();
    client.start(&sh_config(&script)).await.expect("start succeeds");
    assert_eq!(client.state().await, SessionState::Ready);

    // One capability named echo, with its schema intact.
    let tools = client.tools().await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
    assert_eq!(
        tools[0].input_schema["properties"]["msg"]["type"],
        json!("string")
    );

    // Invoke it and get the mock's canned result back.
    let result = client
        .call("echo", json!({ "msg": "hi" }))
        .await
        .expect("call succeeds");
    assert_eq!(result["content"][0]["text"], json!("echo: hi"));

    // Wire-level: initialize, then tools/list, then tools/call with the
    // forwarded name and arguments.
    let frames = read_capture(&capture);
    assert_eq!(frames.len(), 3);

    assert_eq!(frames[0]["method"], json!("initialize"));
    assert_eq!(frames[0]["id"], json!(1));
    assert_eq!(frames[0]["params"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(
        frames[0]["params"]["clientInfo"]["name"],
        json!("rwx-bridge")
    );

    assert_eq!(frames[1]["method"], json!("tools/list"));
    assert_eq!(frames[1]["id"], json!(2));

    assert_eq!(frames[2]["method"], json!("tools/call"));
    assert_eq!(frames[2]["id"], json!(3));
    assert_eq!(frames[2]["params"]["name"], json!("echo"));
    assert_eq!(frames[2]["params"]["arguments"], json!({ "msg": "hi" }));

    client.stop().await;
    assert_eq!(client.state().await, SessionState::Stopped);
    let _ = std::fs::remove_file(&capture);
}

#[tokio::test]
async fn initialize_without_protocol_version_fails_start() {
    // Replies to initialize with an empty result, which is malformed for
    // the handshake even though it is a valid response envelope.
    let script = r#"
IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{}}'
sleep 2
"#;

    let client = ProxyClient::new();
    let err = client
        .start(&sh_config(script))
        .await
        .expect_err("start must fail");

    match err {
        AppError::Proxy(msg) => assert!(msg.contains("protocolVersion"), "got: {msg}"),
        other => panic!("expected proxy error, got {other}"),
    }

    // The session never reached ready and is unusable.
    assert_eq!(client.state().await, SessionState::Stopped);
    let call_err = client
        .call("echo", json!({}))
        .await
        .expect_err("call must be rejected");
    assert!(call_err.to_string().contains("not initialized"));
}

#[tokio::test]
async fn empty_tool_list_is_zero_capabilities_not_an_error() {
    // tools/list result carries no `tools` field at all.
    let script = r#"
IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}'
IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{}}'
sleep 2
"#;

    let client = ProxyClient::new();
    client.start(&sh_config(script)).await.expect("start succeeds");

    assert_eq!(client.state().await, SessionState::Ready);
    assert!(client.tools().await.is_empty());

    client.stop().await;
}

#[tokio::test]
async fn call_before_start_is_rejected_by_the_state_guard() {
    let client = ProxyClient::new();
    let err = client
        .call("echo", json!({}))
        .await
        .expect_err("unstarted client must reject calls");
    assert!(err.to_string().contains("not initialized"));
}

#[tokio::test]
async fn process_exit_during_handshake_embeds_the_exit_code() {
    let client = ProxyClient::new();
    let err = client
        .start(&sh_config("exit 7"))
        .await
        .expect_err("start must fail when the server dies");

    assert!(
        err.to_string().contains('7'),
        "error must embed the exit code: {err}"
    );
    assert_eq!(client.state().await, SessionState::Stopped);
}

#[tokio::test]
async fn exit_after_ready_stops_the_session_and_rejects_new_calls() {
    // Handshake completes; the process exits shortly after. The pause keeps
    // the exit from racing the Ready transition inside start().
    let script = r#"
IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}'
IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[]}}'
sleep 1
exit 3
"#;

    let client = ProxyClient::new();
    client.start(&sh_config(script)).await.expect("start succeeds");
    assert_eq!(client.state().await, SessionState::Ready);

    // The exit monitor fires once the child is gone; poll briefly.
    for _ in 0..150 {
        if client.state().await == SessionState::Stopped {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(client.state().await, SessionState::Stopped);

    let err = client
        .call("echo", json!({}))
        .await
        .expect_err("calls after exit must be rejected immediately");
    assert!(err.to_string().contains("not initialized"));
}

#[tokio::test]
async fn stop_is_idempotent_and_safe_without_start() {
    let client = ProxyClient::new();
    client.stop().await;
    client.stop().await;
    assert_eq!(client.state().await, SessionState::Stopped);

    // Starting after stop is refused — the instance is single-use.
    let err = client
        .start(&sh_config("sleep 1"))
        .await
        .expect_err("stopped client must not restart");
    assert!(matches!(err, AppError::Proxy(_)));
}

#[tokio::test]
async fn stderr_noise_does_not_disturb_the_session() {
    // Banner plus arbitrary diagnostics on stderr while the handshake runs
    // on stdout.
    let script = r#"
echo 'RWX CI/CD MCP Server running on stdio' >&2
echo 'warning: something minor' >&2
IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}'
IFS= read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[]}}'
sleep 2
"#;

    let client = ProxyClient::new();
    client.start(&sh_config(script)).await.expect("start succeeds");
    assert_eq!(client.state().await, SessionState::Ready);
    client.stop().await;
}
