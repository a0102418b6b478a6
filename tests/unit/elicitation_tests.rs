//! Unit tests for elicitation payloads and error conversion.

use rmcp::model::CallToolResult;
use serde_json::Value;

use rwx_bridge::elicitation::{
    access_token_elicitation, cli_install_elicitation, handle_rwx_error, invalid_token_elicitation,
};
use rwx_bridge::AppError;

/// Extract and parse the first text content item as JSON.
fn payload(result: &CallToolResult) -> Value {
    let content = result.content.first().expect("one content item");
    let text = content.as_text().expect("text content");
    serde_json::from_str(&text.text).expect("payload is JSON")
}

#[test]
fn token_elicitation_routes_to_the_setter_tool() {
    let result = access_token_elicitation();
    let body = payload(&result);

    assert_eq!(body["status"], "needs_user_input");
    assert_eq!(body["kind"], "elicitation");
    assert_eq!(body["next_tool"], "set_rwx_access_token");
    assert_eq!(body["input_schema"]["required"], serde_json::json!(["token"]));
    // An elicitation is actionable data, not an error.
    assert_ne!(result.is_error, Some(true));
}

#[test]
fn invalid_token_elicitation_mentions_the_rejection() {
    let body = payload(&invalid_token_elicitation());
    assert!(body["question"]
        .as_str()
        .expect("question")
        .contains("invalid or expired"));
    assert_eq!(body["next_tool"], "set_rwx_access_token");
}

#[test]
fn install_elicitation_differs_for_missing_and_outdated() {
    let missing = payload(&cli_install_elicitation(None));
    assert!(missing["question"]
        .as_str()
        .expect("question")
        .contains("not installed"));

    let outdated = payload(&cli_install_elicitation(Some("2.0.0")));
    let question = outdated["question"].as_str().expect("question");
    assert!(question.contains("2.0.0"));
    assert!(question.contains("upgrade"));

    for body in [&missing, &outdated] {
        assert_eq!(body["next_tool"], "verify_rwx_cli");
        assert_eq!(
            body["input_schema"]["properties"]["confirmed"]["enum"],
            serde_json::json!(["installed"])
        );
    }
}

#[test]
fn generic_errors_become_error_flagged_text() {
    let err = AppError::Cli("rwx exploded".into());
    let result = handle_rwx_error(&err, "launch run");

    assert_eq!(result.is_error, Some(true));
    let content = result.content.first().expect("content");
    let text = &content.as_text().expect("text").text;
    assert!(text.contains("Failed to launch run"));
    assert!(text.contains("rwx exploded"));
}

#[test]
fn unauthorized_errors_become_token_elicitations() {
    let err = AppError::Api("API request failed: 401 Unauthorized".into());
    let result = handle_rwx_error(&err, "fetch status");

    let body = payload(&result);
    assert_eq!(body["status"], "needs_user_input");
    assert_eq!(body["next_tool"], "set_rwx_access_token");
}
