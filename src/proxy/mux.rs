//! Request/response multiplexer for the proxied server's JSON-RPC stream.
//!
//! Every outgoing request is assigned a monotonically increasing correlation
//! id and registered in a pending map *before* its bytes are queued for the
//! writer task, closing the race where the child answers before registration
//! completes. Decoded response frames are matched back to their pending
//! completion slot by id; responses may arrive in any order relative to
//! request issuance.
//!
//! Id allocation and pending-map mutation share one mutex so that
//! register-before-write and remove-on-resolve stay atomic relative to each
//! other; each completion slot fires exactly once (resolve or reject),
//! including through the [`RequestMux::fail_all`] bulk-rejection path.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::proxy::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::{AppError, Result};

/// Single-use completion slot for one in-flight request.
type Completion = oneshot::Sender<Result<Value>>;

/// Id allocator and pending-request table, guarded together.
struct MuxState {
    /// Next correlation id; starts at 1, increments by 1, never reused
    /// while the previous holder is outstanding.
    next_id: u64,
    /// Outstanding requests keyed by correlation id.
    pending: HashMap<u64, Completion>,
    /// Set by the first `fail_all`; later sends are rejected with this
    /// message instead of registering a slot nothing will ever resolve.
    closed: Option<String>,
}

/// Correlates concurrent requests and responses over the shared stream.
pub struct RequestMux {
    state: Mutex<MuxState>,
    write_tx: mpsc::Sender<Value>,
}

impl RequestMux {
    /// Create a multiplexer that queues outbound envelopes on `write_tx`.
    ///
    /// The receiving end is owned by the writer task, which serialises each
    /// envelope as one `\n`-terminated line on the child's stdin. The mpsc
    /// channel preserves `send` call order, so requests are FIFO on the wire
    /// even though responses complete out of order.
    #[must_use]
    pub fn new(write_tx: mpsc::Sender<Value>) -> Self {
        Self {
            state: Mutex::new(MuxState {
                next_id: 1,
                pending: HashMap::new(),
                closed: None,
            }),
            write_tx,
        }
    }

    /// Send `method` with `params` and await the correlated response.
    ///
    /// Suspends until the matching response frame is decoded, the session
    /// fails, or [`RequestMux::fail_all`] runs — whichever happens first.
    /// There is no per-request timeout at this layer.
    ///
    /// # Errors
    ///
    /// - [`AppError::Proxy`] if the writer channel is closed or the
    ///   completion slot is dropped before resolution.
    /// - [`AppError::Remote`] if the response envelope carries an error.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let (tx, rx) = oneshot::channel();

        let id = {
            let mut state = self.state.lock().await;
            if let Some(reason) = &state.closed {
                return Err(AppError::Proxy(reason.clone()));
            }
            let id = state.next_id;
            state.next_id += 1;
            state.pending.insert(id, tx);
            id
        };

        let envelope = match serde_json::to_value(JsonRpcRequest::new(id, method, params)) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.state.lock().await.pending.remove(&id);
                return Err(AppError::Proxy(format!("failed to serialise request: {e}")));
            }
        };

        if self.write_tx.send(envelope).await.is_err() {
            // Writer gone — withdraw the registration so the slot cannot
            // leak or double-fire through a later fail_all.
            self.state.lock().await.pending.remove(&id);
            return Err(AppError::Proxy(
                "server process not running (write channel closed)".into(),
            ));
        }

        rx.await
            .map_err(|_| AppError::Proxy("session terminated before response".into()))?
    }

    /// Handle one decoded frame from the child's stdout.
    ///
    /// Malformed frames and responses with an unknown id are logged and
    /// discarded; neither affects other pending requests or the session.
    pub async fn on_frame(&self, frame: &str) {
        if frame.trim().is_empty() {
            return;
        }

        let response: JsonRpcResponse = match serde_json::from_str(frame) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%err, raw_frame = frame, "failed to parse response frame, skipping");
                return;
            }
        };

        let completion = self.state.lock().await.pending.remove(&response.id);
        let Some(completion) = completion else {
            warn!(id = response.id, "response for unknown request id, discarding");
            return;
        };

        let outcome = match response.error {
            Some(err) => Err(AppError::Remote {
                code: err.code,
                message: err.message,
            }),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };

        if completion.send(outcome).is_err() {
            debug!(id = response.id, "caller dropped before response delivery");
        }
    }

    /// Reject every outstanding request with an error carrying `message`
    /// and clear the pending map.
    ///
    /// Draining the map makes this idempotent per entry: a request rejected
    /// here can never be resolved again by a late frame or a second caller.
    /// The multiplexer is closed afterwards — a `send` racing with the
    /// drain is rejected immediately rather than registering a slot no one
    /// will resolve. Returns the number of requests rejected.
    pub async fn fail_all(&self, message: &str) -> usize {
        let drained: Vec<(u64, Completion)> = {
            let mut state = self.state.lock().await;
            if state.closed.is_none() {
                state.closed = Some(message.to_owned());
            }
            state.pending.drain().collect()
        };

        let count = drained.len();
        for (id, completion) in drained {
            if completion
                .send(Err(AppError::Proxy(message.to_owned())))
                .is_err()
            {
                debug!(id, "caller dropped before bulk rejection delivery");
            }
        }

        count
    }

    /// Number of currently outstanding requests.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}
