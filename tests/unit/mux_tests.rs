//! Unit tests for the request multiplexer.
//!
//! Covers:
//! - monotonic id assignment starting at 1
//! - register-before-write (the pending entry exists by the time the
//!   envelope reaches the write channel)
//! - out-of-order response correlation with no cross-wiring
//! - exactly-once resolution, including through `fail_all`
//! - unknown-id and malformed-frame tolerance
//! - bulk rejection on process exit with the exit code in the message

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use rwx_bridge::proxy::mux::RequestMux;
use rwx_bridge::AppError;

fn response_frame(id: u64, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

#[tokio::test]
async fn ids_start_at_one_and_increment() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    for expected_id in 1..=3u64 {
        let mux_clone = Arc::clone(&mux);
        tokio::spawn(async move {
            let _ = mux_clone.send("ping", json!({})).await;
        });

        let envelope = rx.recv().await.expect("envelope written");
        assert_eq!(envelope["id"], json!(expected_id));
        assert_eq!(envelope["jsonrpc"], json!("2.0"));
        assert_eq!(envelope["method"], json!("ping"));

        // Resolve so the id is no longer outstanding before the next send.
        mux.on_frame(&response_frame(expected_id, json!(null))).await;
    }
}

#[tokio::test]
async fn pending_entry_exists_before_the_envelope_is_written() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    let sender = Arc::clone(&mux);
    let handle = tokio::spawn(async move { sender.send("ping", json!({})).await });

    // By the time the envelope is observable on the write channel the
    // registration must already be in place, so an immediate response
    // cannot be lost.
    let envelope = rx.recv().await.expect("envelope written");
    assert_eq!(mux.pending_count().await, 1);

    mux.on_frame(&response_frame(1, json!("pong"))).await;
    let result = handle.await.expect("task").expect("response");
    assert_eq!(result, json!("pong"));
    assert_eq!(envelope["method"], json!("ping"));
    assert_eq!(mux.pending_count().await, 0);
}

#[tokio::test]
async fn out_of_order_responses_resolve_the_correct_callers() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    // Three concurrent callers, each tagged through its params.
    let mut handles = Vec::new();
    for marker in ["a", "b", "c"] {
        let mux = Arc::clone(&mux);
        handles.push((
            marker,
            tokio::spawn(async move { mux.send("work", json!({ "marker": marker })).await }),
        ));
    }

    // Observe the three envelopes and answer them newest-first, echoing the
    // marker back so cross-wiring would be visible.
    let mut envelopes = Vec::new();
    for _ in 0..3 {
        envelopes.push(rx.recv().await.expect("envelope"));
    }
    assert_eq!(mux.pending_count().await, 3);

    for envelope in envelopes.iter().rev() {
        let id = envelope["id"].as_u64().expect("integer id");
        let marker = envelope["params"]["marker"].clone();
        mux.on_frame(&response_frame(id, json!({ "echo": marker })))
            .await;
    }

    for (marker, handle) in handles {
        let result = handle.await.expect("task").expect("response");
        assert_eq!(
            result["echo"],
            json!(marker),
            "response for marker {marker} must resolve its own caller"
        );
    }
    assert_eq!(mux.pending_count().await, 0);
}

#[tokio::test]
async fn remote_error_envelope_rejects_only_its_own_request() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    let failing = Arc::clone(&mux);
    let failing_handle = tokio::spawn(async move { failing.send("bad", json!({})).await });
    let _ = rx.recv().await;

    let surviving = Arc::clone(&mux);
    let surviving_handle = tokio::spawn(async move { surviving.send("good", json!({})).await });
    let _ = rx.recv().await;

    mux.on_frame(
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "tool exploded" }
        })
        .to_string(),
    )
    .await;

    match failing_handle.await.expect("task") {
        Err(AppError::Remote { code, message }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "tool exploded");
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    // The second request is untouched and still completes normally.
    assert_eq!(mux.pending_count().await, 1);
    mux.on_frame(&response_frame(2, json!("fine"))).await;
    assert_eq!(
        surviving_handle.await.expect("task").expect("response"),
        json!("fine")
    );
}

#[tokio::test]
async fn unknown_response_id_is_discarded_without_damage() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    let sender = Arc::clone(&mux);
    let handle = tokio::spawn(async move { sender.send("ping", json!({})).await });
    let _ = rx.recv().await;

    // No pending request has id 99.
    mux.on_frame(&response_frame(99, json!("stray"))).await;
    assert_eq!(mux.pending_count().await, 1);

    mux.on_frame(&response_frame(1, json!("pong"))).await;
    assert_eq!(
        handle.await.expect("task").expect("response"),
        json!("pong")
    );
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    let sender = Arc::clone(&mux);
    let handle = tokio::spawn(async move { sender.send("ping", json!({})).await });
    let _ = rx.recv().await;

    mux.on_frame("this is not json").await;
    mux.on_frame("").await;
    mux.on_frame("   ").await;
    assert_eq!(mux.pending_count().await, 1, "pending requests survive garbage");

    mux.on_frame(&response_frame(1, json!(42))).await;
    assert_eq!(handle.await.expect("task").expect("response"), json!(42));
}

#[tokio::test]
async fn fail_all_rejects_every_outstanding_request_with_the_exit_code() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let mux = Arc::clone(&mux);
        handles.push(tokio::spawn(
            async move { mux.send("work", json!({})).await },
        ));
        let _ = rx.recv().await;
    }
    assert_eq!(mux.pending_count().await, 3);

    let rejected = mux.fail_all("server process exited with code 1").await;
    assert_eq!(rejected, 3);
    assert_eq!(mux.pending_count().await, 0, "pending set vacated");

    for handle in handles {
        match handle.await.expect("task") {
            Err(AppError::Proxy(msg)) => {
                assert!(msg.contains('1'), "error must embed the exit code: {msg}");
            }
            other => panic!("expected proxy error, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn resolution_happens_exactly_once_even_with_a_late_duplicate() {
    let (tx, mut rx) = mpsc::channel(16);
    let mux = Arc::new(RequestMux::new(tx));

    let sender = Arc::clone(&mux);
    let handle = tokio::spawn(async move { sender.send("ping", json!({})).await });
    let _ = rx.recv().await;

    mux.on_frame(&response_frame(1, json!("first"))).await;
    // A duplicate for the same id hits the unknown-id path, not the caller.
    mux.on_frame(&response_frame(1, json!("second"))).await;

    assert_eq!(
        handle.await.expect("task").expect("response"),
        json!("first")
    );

    // And fail_all over an empty table rejects nothing.
    assert_eq!(mux.fail_all("too late").await, 0);
}

#[tokio::test]
async fn send_fails_cleanly_when_the_writer_is_gone() {
    let (tx, rx) = mpsc::channel(16);
    drop(rx);
    let mux = RequestMux::new(tx);

    match mux.send("ping", json!({})).await {
        Err(AppError::Proxy(msg)) => assert!(msg.contains("not running")),
        other => panic!("expected proxy error, got {other:?}"),
    }
    // The registration was withdrawn; nothing is left pending.
    assert_eq!(mux.pending_count().await, 0);
}
