//! Utility streams, shared by client and server sides (component I): ping
//! liveness, progress correlation, the logging severity filter, and
//! best-effort cancellation bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::core::peer::{BoxFuture, HandlerError, NotificationHandler, Peer};
use crate::protocol::methods as m;
use crate::protocol::types::{LoggingLevel, ProgressToken, RequestId};

/// Callback invoked for each `notifications/progress` carrying a token this
/// peer is listening for. Unknown tokens are dropped per §4.I.
pub type ProgressListener = Arc<dyn Fn(f64, Option<f64>, Option<String>) + Send + Sync>;

pub struct StreamsModule {
    peer: Mutex<Option<Arc<Peer>>>,
    min_level: Mutex<Option<LoggingLevel>>,
    progress_listeners: Mutex<HashMap<ProgressToken, ProgressListener>>,
    cancelled: Mutex<HashSet<RequestId>>,
}

impl StreamsModule {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            peer: Mutex::new(None),
            min_level: Mutex::new(None),
            progress_listeners: Mutex::new(HashMap::new()),
            cancelled: Mutex::new(HashSet::new()),
        })
    }

    /// Installs the ping responder, the progress/cancellation notification
    /// handlers, and (when `accepts_set_level` is true) the `logging/setLevel`
    /// request handler a server advertises via `enable_logging`.
    pub fn install(self: &Arc<Self>, peer: &Arc<Peer>, accepts_set_level: bool) {
        *self.peer.lock().unwrap() = Some(peer.clone());

        peer.register_request_handler(m::PING, Arc::new(|_params| Box::pin(async { Ok(Value::Object(Default::default())) })));

        let this = self.clone();
        peer.register_notification_handler(m::PROGRESS, progress_handler(this));

        let this = self.clone();
        peer.register_notification_handler(m::CANCELLED, cancelled_handler(this));

        if accepts_set_level {
            let this = self.clone();
            peer.register_request_handler(m::LOGGING_SET_LEVEL, Arc::new(move |params| this.clone().handle_set_level(params)));
        }
    }

    /// Registers a callback for progress notifications carrying `token`.
    /// Callers should deregister once their request settles.
    pub fn watch_progress(&self, token: ProgressToken, listener: ProgressListener) {
        self.progress_listeners.lock().unwrap().insert(token, listener);
    }

    pub fn stop_watching_progress(&self, token: &ProgressToken) {
        self.progress_listeners.lock().unwrap().remove(token);
    }

    /// Emits `notifications/message` only if `level` is at or above the
    /// currently configured minimum. With no minimum set, everything passes.
    pub fn log(&self, level: LoggingLevel, logger: Option<&str>, data: Value) {
        let threshold = *self.min_level.lock().unwrap();
        if let Some(threshold) = threshold {
            if level < threshold {
                return;
            }
        }
        let Some(peer) = self.peer.lock().unwrap().clone() else { return };
        let mut params = serde_json::Map::new();
        params.insert("level".to_string(), serde_json::to_value(level).unwrap());
        if let Some(logger) = logger {
            params.insert("logger".to_string(), Value::String(logger.to_string()));
        }
        params.insert("data".to_string(), data);
        let _ = peer.send_notification(m::LOGGING_MESSAGE, Some(Value::Object(params)));
    }

    /// Best-effort cancellation: records `id` as cancelled so a running
    /// handler can poll [`StreamsModule::is_cancelled`]. Does not interrupt
    /// anything on its own, per §4.I.
    pub fn mark_cancelled(&self, id: RequestId) {
        self.cancelled.lock().unwrap().insert(id);
    }

    pub fn is_cancelled(&self, id: &RequestId) -> bool {
        self.cancelled.lock().unwrap().contains(id)
    }

    fn handle_set_level(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize)]
            struct SetLevelParams {
                level: LoggingLevel,
            }
            let request: SetLevelParams = serde_json::from_value(params)
                .map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INVALID_PARAMS, e.to_string()))?;
            *self.min_level.lock().unwrap() = Some(request.level);
            Ok(Value::Object(Default::default()))
        })
    }
}

fn progress_handler(module: Arc<StreamsModule>) -> NotificationHandler {
    Arc::new(move |params| {
        let module = module.clone();
        Box::pin(async move {
            #[derive(serde::Deserialize)]
            struct ProgressParams {
                #[serde(rename = "progressToken")]
                progress_token: ProgressToken,
                progress: f64,
                #[serde(default)]
                total: Option<f64>,
                #[serde(default)]
                message: Option<String>,
            }
            let Ok(notification) = serde_json::from_value::<ProgressParams>(params) else { return };
            let listener = module.progress_listeners.lock().unwrap().get(&notification.progress_token).cloned();
            if let Some(listener) = listener {
                listener(notification.progress, notification.total, notification.message);
            }
        })
    })
}

fn cancelled_handler(module: Arc<StreamsModule>) -> NotificationHandler {
    Arc::new(move |params| {
        let module = module.clone();
        Box::pin(async move {
            #[derive(serde::Deserialize)]
            struct CancelledParams {
                #[serde(rename = "requestId")]
                request_id: RequestId,
            }
            if let Ok(notification) = serde_json::from_value::<CancelledParams>(params) {
                module.mark_cancelled(notification.request_id);
            }
        })
    })
}
