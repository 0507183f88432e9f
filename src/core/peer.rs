//! The symmetric JSON-RPC peer (component B) — the architectural heart of
//! the crate. Maintains outbound request correlation and inbound dispatch
//! tables, and drains a transport without letting slow handlers block
//! further reads (no head-of-line blocking).

use crate::core::codec::{parse_line, LineCodec};
use crate::core::error::{McpError, McpResult};
use crate::core::lifecycle::Lifecycle;
use crate::protocol::messages::{IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::protocol::types::{error_codes, RequestId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

/// Hand-rolled boxed future, avoiding a dependency on the `futures` crate for
/// the one thing this crate needs from it: naming a trait object's future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An error a request handler raises, mapped onto a JSON-RPC error response.
/// Handlers that want a specific code/data shape construct this directly;
/// any other error (via `From<McpError>`) maps to `Internal error (-32603)`.
#[derive(Debug, Clone)]
pub struct HandlerError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl From<McpError> for HandlerError {
    fn from(err: McpError) -> Self {
        HandlerError {
            code: err.rpc_code(),
            message: err.to_string(),
            data: None,
        }
    }
}

impl HandlerError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

pub type RequestHandler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, HandlerError>> + Send + Sync>;
pub type NotificationHandler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// A symmetric JSON-RPC 2.0 peer. One instance serves either side of a
/// connection; client and server behavior differs only in which handlers are
/// registered and which capability record is advertised, per the
/// capability-module design (see [`crate::core::capability`]).
pub struct Peer {
    next_id: AtomicI64,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>,
    request_handlers: Mutex<HashMap<String, RequestHandler>>,
    notification_handlers: Mutex<HashMap<String, Vec<NotificationHandler>>>,
    outbound_tx: mpsc::UnboundedSender<serde_json::Value>,
    closed: AtomicBool,
    lifecycle: Mutex<Option<Arc<Lifecycle>>>,
}

impl Peer {
    /// Creates a peer and the outbound channel its writer task should drain.
    pub fn new() -> (Arc<Peer>, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Peer {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            request_handlers: Mutex::new(HashMap::new()),
            notification_handlers: Mutex::new(HashMap::new()),
            outbound_tx: tx,
            closed: AtomicBool::new(false),
            lifecycle: Mutex::new(None),
        });
        (peer, rx)
    }

    /// Attaches the lifecycle gate inbound requests must satisfy before this
    /// peer's own handler runs (§4.E: only `initialize`/`ping` before
    /// `Active`). Peers with no lifecycle attached permit every request,
    /// which is what the peer-only unit tests in this module rely on.
    pub fn set_lifecycle(&self, lifecycle: Arc<Lifecycle>) {
        *self.lifecycle.lock().unwrap() = Some(lifecycle);
    }

    pub fn register_request_handler(&self, method: impl Into<String>, handler: RequestHandler) {
        self.request_handlers.lock().unwrap().insert(method.into(), handler);
    }

    pub fn register_notification_handler(&self, method: impl Into<String>, handler: NotificationHandler) {
        self.notification_handlers
            .lock()
            .unwrap()
            .entry(method.into())
            .or_default()
            .push(handler);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends a request and resolves when the matching response arrives, or
    /// fails with `TransportClosed` if the peer shuts down first — satisfies
    /// invariant 1 (every `send_request` future resolves exactly once).
    pub async fn send_request(&self, method: &str, params: Option<serde_json::Value>) -> McpResult<serde_json::Value> {
        if self.is_closed() {
            return Err(McpError::TransportClosed(format!(
                "peer already closed, cannot send {method}"
            )));
        }

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id.clone(), tx);

        let request = JsonRpcRequest::new(id.clone(), method, params);
        let value = serde_json::to_value(&request)?;
        if self.outbound_tx.send(value).is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(McpError::TransportClosed(format!(
                "transport writer gone, cannot send {method}"
            )));
        }

        match rx.await {
            Ok(response) => response
                .into_result()
                .map_err(|e| McpError::Protocol(format!("{} (code {})", e.message, e.code))),
            Err(_) => Err(McpError::TransportClosed(format!(
                "peer shut down before a response to {method} arrived"
            ))),
        }
    }

    /// Fire-and-forget; no id, no correlation.
    pub fn send_notification(&self, method: &str, params: Option<serde_json::Value>) -> McpResult<()> {
        if self.is_closed() {
            return Err(McpError::TransportClosed(format!(
                "peer already closed, cannot notify {method}"
            )));
        }
        let notification = JsonRpcNotification::new(method, params);
        let value = serde_json::to_value(&notification)?;
        self.outbound_tx
            .send(value)
            .map_err(|_| McpError::TransportClosed(format!("transport writer gone, cannot notify {method}")))
    }

    /// Fails every pending outbound request with `TransportClosed` and marks
    /// the peer closed so further sends fail fast.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().unwrap().clear();
    }

    async fn handle_request(self: Arc<Self>, request: JsonRpcRequest) -> JsonRpcResponse {
        let permitted = self
            .lifecycle
            .lock()
            .unwrap()
            .as_ref()
            .map_or(true, |l| l.permits(&request.method));
        if !permitted {
            return JsonRpcResponse::failure(
                request.id,
                error_codes::INVALID_REQUEST,
                format!("Method not permitted before initialization: {}", request.method),
                None,
            );
        }

        let handler = self.request_handlers.lock().unwrap().get(&request.method).cloned();
        match handler {
            None => JsonRpcResponse::failure(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
                None,
            ),
            Some(handler) => {
                let params = request.params.unwrap_or(serde_json::Value::Null);
                match handler(params).await {
                    Ok(result) => JsonRpcResponse::success(request.id, result),
                    Err(err) => JsonRpcResponse::failure(request.id, err.code, err.message, err.data),
                }
            }
        }
    }

    async fn handle_notification(self: Arc<Self>, notification: JsonRpcNotification) {
        let handlers = self
            .notification_handlers
            .lock()
            .unwrap()
            .get(&notification.method)
            .cloned()
            .unwrap_or_default();
        let params = notification.params.unwrap_or(serde_json::Value::Null);
        for handler in handlers {
            handler(params.clone()).await;
        }
    }

    fn handle_response(&self, response: JsonRpcResponse) {
        let sender = self.pending.lock().unwrap().remove(&response.id);
        match sender {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => {
                tracing::debug!(id = %response.id, "dropping unmatched response");
            }
        }
    }

    fn write(self: &Arc<Self>, value: serde_json::Value) {
        let _ = self.outbound_tx.send(value);
    }

    /// Dispatches one already-parsed inbound JSON value: a single request,
    /// notification, response, or a batch thereof. Requests are dispatched
    /// on their own task so a slow handler never blocks the read loop.
    ///
    /// A value that carries an `id` but doesn't match any known envelope
    /// shape (e.g. `method` not a string) still gets a `-32700` response for
    /// that id, rather than being dropped silently — a client waiting on
    /// that id must not hang forever.
    pub fn dispatch(self: &Arc<Self>, value: serde_json::Value) {
        let id = value.get("id").cloned().and_then(|v| serde_json::from_value::<RequestId>(v).ok());
        let parsed = match IncomingMessage::from_value(value) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "discarding message that does not match any known envelope shape");
                if let Some(id) = id {
                    let response = JsonRpcResponse::failure(id, error_codes::PARSE_ERROR, format!("Parse error: {err}"), None);
                    if let Ok(value) = serde_json::to_value(&response) {
                        self.write(value);
                    }
                }
                return;
            }
        };
        self.dispatch_parsed(parsed);
    }

    fn dispatch_parsed(self: &Arc<Self>, message: IncomingMessage) {
        match message {
            IncomingMessage::Request(request) => {
                let this = self.clone();
                tokio::spawn(async move {
                    let response = this.clone().handle_request(request).await;
                    if let Ok(value) = serde_json::to_value(&response) {
                        this.write(value);
                    }
                });
            }
            IncomingMessage::Notification(notification) => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.handle_notification(notification).await;
                });
            }
            IncomingMessage::Response(response) => self.handle_response(response),
            IncomingMessage::Batch(items) => {
                let this = self.clone();
                tokio::spawn(async move { this.dispatch_batch(items).await });
            }
        }
    }

    fn dispatch_batch(self: Arc<Self>, items: Vec<IncomingMessage>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let mut request_tasks = Vec::new();
            for item in items {
                match item {
                    IncomingMessage::Request(request) => {
                        let this = self.clone();
                        request_tasks.push(tokio::spawn(async move {
                            serde_json::to_value(&this.handle_request(request).await).ok()
                        }));
                    }
                    IncomingMessage::Notification(notification) => {
                        let this = self.clone();
                        tokio::spawn(async move { this.handle_notification(notification).await });
                    }
                    IncomingMessage::Response(response) => self.handle_response(response),
                    IncomingMessage::Batch(nested) => self.clone().dispatch_batch(nested).await,
                }
            }

            let mut responses = Vec::new();
            for task in request_tasks {
                if let Ok(Some(value)) = task.await {
                    responses.push(value);
                }
            }
            if !responses.is_empty() {
                self.write(serde_json::Value::Array(responses));
            }
        })
    }

    /// Drives the peer to completion: spawns a writer task draining
    /// `outbound_rx` and reads lines from `reader` until EOF, dispatching
    /// each. Returns once the transport is exhausted; the caller is
    /// responsible for tearing down the underlying stream.
    pub async fn run<R, W>(
        self: Arc<Self>,
        reader: R,
        mut writer: W,
        mut outbound_rx: mpsc::UnboundedReceiver<serde_json::Value>,
    ) -> McpResult<()>
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let writer_task = tokio::spawn(async move {
            while let Some(value) = outbound_rx.recv().await {
                let mut text = match serde_json::to_string(&value) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping outbound message that failed to serialize");
                        continue;
                    }
                };
                text.push('\n');
                if writer.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
                if writer.flush().await.is_err() {
                    break;
                }
            }
        });

        let mut codec = LineCodec::new(reader, tokio::io::sink());
        loop {
            let line = match codec.read_line().await? {
                Some(line) => line,
                None => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(value) => self.dispatch(value),
                Err(err) => {
                    tracing::warn!(error = %err, line = %line, "discarding unparseable line");
                }
            }
        }

        self.shutdown();
        writer_task.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_request_resolves_on_matching_response() {
        let (peer, mut outbound) = Peer::new();
        let peer2 = peer.clone();
        tokio::spawn(async move {
            let sent = outbound.recv().await.unwrap();
            let id: RequestId = serde_json::from_value(sent["id"].clone()).unwrap();
            peer2.dispatch(json!({"jsonrpc":"2.0","id": id, "result": {"ok": true}}));
        });
        let result = peer.send_request("ping", None).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn send_request_fails_with_transport_closed_after_shutdown() {
        let (peer, _outbound) = Peer::new();
        let peer2 = peer.clone();
        let handle = tokio::spawn(async move { peer2.send_request("ping", None).await });
        // give the request a chance to register before shutting down
        tokio::task::yield_now().await;
        peer.shutdown();
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.category(), "transport");
    }

    #[tokio::test]
    async fn requests_before_initialize_are_rejected_when_lifecycle_attached() {
        use crate::core::lifecycle::Lifecycle;

        let (peer, mut outbound) = Peer::new();
        peer.set_lifecycle(Arc::new(Lifecycle::new()));
        peer.register_request_handler(
            "tools/call",
            Arc::new(|_| Box::pin(async move { Ok(json!({})) })),
        );
        peer.dispatch(json!({"jsonrpc":"2.0","id":1,"method":"tools/call"}));
        let response = outbound.recv().await.unwrap();
        assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn ping_is_permitted_before_initialize() {
        use crate::core::lifecycle::Lifecycle;

        let (peer, mut outbound) = Peer::new();
        peer.set_lifecycle(Arc::new(Lifecycle::new()));
        peer.register_request_handler(
            "ping",
            Arc::new(|_| Box::pin(async move { Ok(json!({})) })),
        );
        peer.dispatch(json!({"jsonrpc":"2.0","id":1,"method":"ping"}));
        let response = outbound.recv().await.unwrap();
        assert!(response.get("result").is_some());
    }

    #[tokio::test]
    async fn malformed_envelope_with_id_gets_parse_error_response() {
        let (peer, mut outbound) = Peer::new();
        // `method` must be a string; this value carries a recoverable `id`
        // but fails to deserialize as any known envelope shape.
        peer.dispatch(json!({"jsonrpc":"2.0","id":7,"method":123}));
        let response = outbound.recv().await.unwrap();
        assert_eq!(response["id"], json!(7));
        assert_eq!(response["error"]["code"], error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn malformed_envelope_without_id_is_dropped_silently() {
        let (peer, mut outbound) = Peer::new();
        peer.dispatch(json!({"jsonrpc":"2.0","method":123}));
        assert!(tokio::time::timeout(std::time::Duration::from_millis(200), outbound.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unregistered_method_gets_method_not_found() {
        let (peer, mut outbound) = Peer::new();
        peer.dispatch(json!({"jsonrpc":"2.0","id":1,"method":"nope"}));
        let response = outbound.recv().await.unwrap();
        assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn batch_of_requests_yields_single_array_response() {
        let (peer, mut outbound) = Peer::new();
        peer.register_request_handler(
            "echo",
            Arc::new(|params| Box::pin(async move { Ok(params) })),
        );
        peer.dispatch(json!([
            {"jsonrpc":"2.0","id":1,"method":"echo","params":{"a":1}},
            {"jsonrpc":"2.0","id":2,"method":"echo","params":{"a":2}}
        ]));
        let response = outbound.recv().await.unwrap();
        assert!(response.is_array());
        assert_eq!(response.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_of_only_notifications_produces_no_response() {
        let (peer, mut outbound) = Peer::new();
        let received = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let r2 = received.clone();
        peer.register_notification_handler(
            "note",
            Arc::new(move |_| {
                let r2 = r2.clone();
                Box::pin(async move {
                    r2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                })
            }),
        );
        peer.dispatch(json!([
            {"jsonrpc":"2.0","method":"note"},
            {"jsonrpc":"2.0","method":"note"}
        ]));
        assert!(tokio::time::timeout(std::time::Duration::from_millis(200), outbound.recv())
            .await
            .is_err());
    }
}
