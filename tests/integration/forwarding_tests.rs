//! Integration tests for capability forwarding over a live mock session.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use rwx_bridge::cloud::CloudClient;
use rwx_bridge::config::{AccessToken, LogCacheConfig};
use rwx_bridge::logs::LogStore;
use rwx_bridge::mcp::handler::{AppState, BridgeServer};
use rwx_bridge::mcp::proxy_tool::forward;
use rwx_bridge::proxy::ProxyClient;
use rwx_bridge::workflow::RwxLintParser;
use rwx_bridge::GlobalConfig;

use super::test_helpers::{echo_server_script, sh_config, text_call_response};

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("args must be an object"),
    }
}

fn scratch_capture(name: &str) -> String {
    let path = std::env::temp_dir().join(format!(
        "rwx-bridge-fwd-{name}-{}",
        std::process::id()
    ));
    let path = path.to_string_lossy().into_owned();
    let _ = std::fs::remove_file(&path);
    path
}

async fn started_client(call_response: &str, capture: &str) -> Arc<ProxyClient> {
    let script = echo_server_script(capture, call_response);
    let client = Arc::new(ProxyClient::new());
    client.start(&sh_config(&script)).await.expect("start succeeds");
    client
}

#[tokio::test]
async fn forwarded_result_in_standard_shape_passes_through() {
    let capture = scratch_capture("standard");
    let client = started_client(&text_call_response(3, "echo: hi"), &capture).await;

    let result = forward(&client, "echo", args(json!({ "msg": "hi" })), false).await;

    assert_ne!(result.is_error, Some(true));
    let text = &result.content[0].as_text().expect("text content").text;
    assert_eq!(text, "echo: hi");

    client.stop().await;
    let _ = std::fs::remove_file(&capture);
}

#[tokio::test]
async fn forwarding_failure_becomes_an_error_result_not_a_fault() {
    // Unstarted client: every call fails with "not initialized".
    let client = ProxyClient::new();

    let result = forward(&client, "echo", args(json!({ "msg": "hi" })), false).await;

    assert_eq!(result.is_error, Some(true));
    let text = &result.content[0].as_text().expect("text content").text;
    assert!(text.contains("Error calling echo"));
    assert!(text.contains("not initialized"));
}

#[tokio::test]
async fn reference_rewriting_applies_when_enabled() {
    let capture = scratch_capture("rewrite");
    let canned = text_call_response(3, "Next, run `rwx run` or check rwx results output.");
    let client = started_client(&canned, &capture).await;

    let result = forward(&client, "echo", args(json!({ "msg": "hi" })), true).await;

    let text = &result.content[0].as_text().expect("text content").text;
    assert_eq!(
        text,
        "Next, run `launch_ci_run` or check get_run_results output."
    );

    client.stop().await;
    let _ = std::fs::remove_file(&capture);
}

#[tokio::test]
async fn bridge_server_lists_proxied_tools_before_native_ones() {
    let capture = scratch_capture("listing");
    let client = started_client(&text_call_response(3, "unused"), &capture).await;
    let descriptors = client.tools().await;

    let config = Arc::new(GlobalConfig::default());
    let token = AccessToken::new();
    let cloud = CloudClient::new(config.cloud_base_url.clone(), token.clone());
    let state = Arc::new(AppState {
        config,
        proxy: Arc::clone(&client),
        cloud: cloud.clone(),
        logs: Arc::new(LogStore::new(cloud, &LogCacheConfig::default())),
        access_token: token,
        workflow_parser: Arc::new(RwxLintParser),
    });

    let server = BridgeServer::new(state, &descriptors);
    let names: Vec<String> = server
        .tools()
        .iter()
        .map(|tool| tool.name.to_string())
        .collect();

    // Proxied capability first, then the native surface.
    assert_eq!(names[0], "echo");
    for native in [
        "launch_ci_run",
        "wait_for_ci_run",
        "get_run_results",
        "get_recent_runs",
        "get_task_logs",
        "head_logs",
        "tail_logs",
        "grep_logs",
        "get_artifacts",
        "analyze_ci_run",
        "compare_runs",
        "validate_workflow",
        "verify_rwx_cli",
        "set_rwx_access_token",
    ] {
        assert!(names.contains(&native.to_owned()), "missing {native}");
    }

    // The proxied schema went through the conversion layer.
    let echo_schema = server.tools()[0].input_schema.as_ref();
    assert_eq!(echo_schema["properties"]["msg"]["type"], "string");
    assert_eq!(echo_schema["required"], json!(["msg"]));

    client.stop().await;
    let _ = std::fs::remove_file(&capture);
}
