//! Resource subsystem, server-side (component F).
//!
//! Owns exact-URI resources, URI templates, the subscription set, and the
//! throttled `resources/updated` / `resources/list_changed` notifications
//! described in §4.F: leading-edge-immediate, trailing-edge-coalesced, one
//! timer per URI for `updated` and a single global timer for `list_changed`.

use crate::core::error::{McpError, McpResult};
use crate::core::peer::{BoxFuture, HandlerError, Peer};
use crate::protocol::methods as m;
use crate::protocol::types::{
    Cursor, PaginatedRequestParams, Resource, ResourceContents, ResourceTemplate,
};
use crate::utils::pagination::{paginate, Page};
use crate::utils::uri::matches_template;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(1);
const PAGE_SIZE: usize = 50;
const LIST_CHANGED_KEY: &str = "__list_changed__";

pub type ReadHandler = Arc<dyn Fn(String) -> BoxFuture<'static, McpResult<ResourceContents>> + Send + Sync>;

struct RegisteredResource {
    resource: Resource,
    handler: ReadHandler,
}

struct RegisteredTemplate {
    template: ResourceTemplate,
    handler: ReadHandler,
}

/// Whether an event landed inside an open throttle window that still needs a
/// trailing-edge emission when the window's timer fires.
#[derive(Default)]
struct Window {
    dirty: bool,
}

#[derive(Default)]
struct ThrottleGate {
    windows: Mutex<HashMap<String, Window>>,
}

impl ThrottleGate {
    /// Records an event for `key`. `true` means this event opened a fresh
    /// window — the caller must emit the leading-edge notification and arm a
    /// timer. `false` means it landed inside an existing window and was
    /// coalesced; nothing to emit now.
    fn record(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().unwrap();
        match windows.get_mut(key) {
            Some(window) => {
                window.dirty = true;
                false
            }
            None => {
                windows.insert(key.to_string(), Window::default());
                true
            }
        }
    }

    /// Called when a window's timer fires. Returns whether a trailing-edge
    /// notification is owed, and closes the window either way.
    fn close(&self, key: &str) -> bool {
        self.windows
            .lock()
            .unwrap()
            .remove(key)
            .is_some_and(|w| w.dirty)
    }
}

struct ResourceState {
    resources: HashMap<String, RegisteredResource>,
    templates: Vec<RegisteredTemplate>,
    subscriptions: HashSet<String>,
}

/// Server-side resource storage, subscription fan-out, and throttled
/// notifications. Install once per server peer via [`ResourcesModule::install`].
pub struct ResourcesModule {
    state: AsyncMutex<ResourceState>,
    peer: Mutex<Option<Arc<Peer>>>,
    update_gate: ThrottleGate,
    list_changed_gate: ThrottleGate,
    throttle_delay: Duration,
}

impl ResourcesModule {
    pub fn new(throttle_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: AsyncMutex::new(ResourceState {
                resources: HashMap::new(),
                templates: Vec::new(),
                subscriptions: HashSet::new(),
            }),
            peer: Mutex::new(None),
            update_gate: ThrottleGate::default(),
            list_changed_gate: ThrottleGate::default(),
            throttle_delay,
        })
    }

    pub fn install(self: &Arc<Self>, peer: &Arc<Peer>, registry: &mut crate::core::capability::CapabilityRegistry) {
        *self.peer.lock().unwrap() = Some(peer.clone());
        registry.enable_resources(true, true);

        let this = self.clone();
        peer.register_request_handler(
            m::RESOURCES_LIST,
            Arc::new(move |params| this.clone().handle_list(params)),
        );
        let this = self.clone();
        peer.register_request_handler(
            m::RESOURCES_TEMPLATES_LIST,
            Arc::new(move |params| this.clone().handle_templates_list(params)),
        );
        let this = self.clone();
        peer.register_request_handler(
            m::RESOURCES_READ,
            Arc::new(move |params| this.clone().handle_read(params)),
        );
        let this = self.clone();
        peer.register_request_handler(
            m::RESOURCES_SUBSCRIBE,
            Arc::new(move |params| this.clone().handle_subscribe(params)),
        );
        let this = self.clone();
        peer.register_request_handler(
            m::RESOURCES_UNSUBSCRIBE,
            Arc::new(move |params| this.clone().handle_unsubscribe(params)),
        );
    }

    pub async fn add_resource(self: &Arc<Self>, resource: Resource, handler: ReadHandler) {
        let uri = resource.uri.clone();
        self.state
            .lock()
            .await
            .resources
            .insert(uri, RegisteredResource { resource, handler });
        self.schedule_list_changed();
    }

    pub async fn remove_resource(self: &Arc<Self>, uri: &str) {
        self.state.lock().await.resources.remove(uri);
        self.schedule_list_changed();
    }

    /// Schedules an `updated` notification for `uri`, but only if a client
    /// currently has a standing subscription (§4.F: update_resource
    /// schedules iff subscribed).
    pub async fn update_resource(self: &Arc<Self>, uri: &str) {
        let subscribed = self.state.lock().await.subscriptions.contains(uri);
        if subscribed {
            self.schedule_update(uri.to_string());
        }
    }

    pub async fn add_resource_template(self: &Arc<Self>, template: ResourceTemplate, handler: ReadHandler) {
        self.state
            .lock()
            .await
            .templates
            .push(RegisteredTemplate { template, handler });
        self.schedule_list_changed();
    }

    fn schedule_list_changed(self: &Arc<Self>) {
        if !self.list_changed_gate.record(LIST_CHANGED_KEY) {
            return;
        }
        self.emit_list_changed();

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.throttle_delay).await;
            if this.list_changed_gate.close(LIST_CHANGED_KEY) {
                this.emit_list_changed();
            }
        });
    }

    fn schedule_update(self: &Arc<Self>, uri: String) {
        if !self.update_gate.record(&uri) {
            return;
        }
        self.emit_updated_if_subscribed(&uri);

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.throttle_delay).await;
            if this.update_gate.close(&uri) {
                this.emit_updated_if_subscribed(&uri);
            }
        });
    }

    fn emit_list_changed(&self) {
        if let Some(peer) = self.peer.lock().unwrap().as_ref() {
            let _ = peer.send_notification(m::RESOURCES_LIST_CHANGED, None);
        }
    }

    /// Fires a best-effort `updated` notification. The subscription set can
    /// only be checked synchronously here (the caller already confirmed
    /// subscription on the leading edge); trailing-edge emission re-checks
    /// via `blocking` read of the last known state is avoided by keeping
    /// subscriptions monotonic enough in practice for this crate's scope —
    /// unsubscribing mid-window still allows at most one stray trailing
    /// notification, matching invariant 6's "modulo one already-buffered
    /// trailing-edge event" carve-out.
    fn emit_updated_if_subscribed(&self, uri: &str) {
        if let Some(peer) = self.peer.lock().unwrap().as_ref() {
            #[derive(Serialize)]
            struct Params<'a> {
                uri: &'a str,
            }
            let params = serde_json::to_value(Params { uri }).ok();
            let _ = peer.send_notification(m::RESOURCES_UPDATED, params);
        }
    }

    fn handle_list(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            let request: PaginatedRequestParams = parse_params(params)?;
            let state = self.state.lock().await;
            let mut resources: Vec<&Resource> = state.resources.values().map(|r| &r.resource).collect();
            resources.sort_by(|a, b| a.uri.cmp(&b.uri));
            let Page { items, next_cursor } = paginate(resources, request.cursor.as_deref(), PAGE_SIZE);
            let items: Vec<Resource> = items.into_iter().cloned().collect();
            Ok(json_result(items, next_cursor, "resources"))
        })
    }

    fn handle_templates_list(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            let request: PaginatedRequestParams = parse_params(params)?;
            let state = self.state.lock().await;
            let templates: Vec<&ResourceTemplate> = state.templates.iter().map(|t| &t.template).collect();
            let Page { items, next_cursor } = paginate(templates, request.cursor.as_deref(), PAGE_SIZE);
            let items: Vec<ResourceTemplate> = items.into_iter().cloned().collect();
            Ok(json_result(items, next_cursor, "resourceTemplates"))
        })
    }

    fn handle_read(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize, Default)]
            struct ReadParams {
                uri: String,
            }
            let request: ReadParams = parse_params(params)?;
            let contents = self.read(&request.uri).await.map_err(HandlerError::from)?;
            Ok(serde_json::json!({ "contents": [contents] }))
        })
    }

    /// Reads a uri: tries an exact resource entry first, then templates in
    /// insertion order; the first matching handler wins.
    pub async fn read(&self, uri: &str) -> McpResult<ResourceContents> {
        let (exact_handler, templates): (Option<ReadHandler>, Vec<(String, ReadHandler)>) = {
            let state = self.state.lock().await;
            let exact = state.resources.get(uri).map(|r| r.handler.clone());
            let templates = state
                .templates
                .iter()
                .map(|t| (t.template.uri_template.clone(), t.handler.clone()))
                .collect();
            (exact, templates)
        };

        if let Some(handler) = exact_handler {
            return handler(uri.to_string()).await;
        }

        for (uri_template, handler) in templates {
            if !matches_template(&uri_template, uri) {
                continue;
            }
            match handler(uri.to_string()).await {
                Ok(contents) => return Ok(contents),
                Err(McpError::InvalidParams(msg)) => return Err(McpError::InvalidParams(msg)),
                Err(_) => continue,
            }
        }

        Err(McpError::ResourceNotFound(uri.to_string()))
    }

    fn handle_subscribe(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize, Default)]
            struct P {
                uri: String,
            }
            let request: P = parse_params(params)?;
            self.state.lock().await.subscriptions.insert(request.uri);
            Ok(serde_json::json!({}))
        })
    }

    fn handle_unsubscribe(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize, Default)]
            struct P {
                uri: String,
            }
            let request: P = parse_params(params)?;
            self.state.lock().await.subscriptions.remove(&request.uri);
            Ok(serde_json::json!({}))
        })
    }
}

fn parse_params<T: serde::de::DeserializeOwned + Default>(value: Value) -> Result<T, HandlerError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value)
        .map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INVALID_PARAMS, e.to_string()))
}

fn json_result<T: Serialize>(items: Vec<T>, next_cursor: Option<Cursor>, key: &str) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert(key.to_string(), serde_json::to_value(items).unwrap());
    if let Some(cursor) = next_cursor {
        obj.insert("nextCursor".to_string(), Value::String(cursor));
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::TextResourceContents;

    fn text_handler(text: &'static str) -> ReadHandler {
        Arc::new(move |uri| {
            Box::pin(async move {
                Ok(ResourceContents::Text(TextResourceContents {
                    uri,
                    text: text.to_string(),
                    mime_type: None,
                }))
            })
        })
    }

    #[tokio::test]
    async fn read_prefers_exact_resource_over_templates() {
        let module = ResourcesModule::new(Duration::ZERO);
        module
            .add_resource(
                Resource {
                    uri: "foo://x".into(),
                    name: "x".into(),
                    mime_type: None,
                    description: None,
                    annotations: None,
                },
                text_handler("exact"),
            )
            .await;
        module
            .add_resource_template(
                ResourceTemplate {
                    uri_template: "foo://{id}".into(),
                    name: "tpl".into(),
                    mime_type: None,
                    description: None,
                },
                text_handler("template"),
            )
            .await;

        let contents = module.read("foo://x").await.unwrap();
        match contents {
            ResourceContents::Text(t) => assert_eq!(t.text, "exact"),
            _ => panic!("expected text"),
        }
    }

    #[tokio::test]
    async fn read_falls_back_to_first_matching_template() {
        let module = ResourcesModule::new(Duration::ZERO);
        module
            .add_resource_template(
                ResourceTemplate {
                    uri_template: "foo://{id}".into(),
                    name: "tpl".into(),
                    mime_type: None,
                    description: None,
                },
                text_handler("template"),
            )
            .await;
        let contents = module.read("foo://42").await.unwrap();
        match contents {
            ResourceContents::Text(t) => assert_eq!(t.text, "template"),
            _ => panic!("expected text"),
        }
    }

    #[tokio::test]
    async fn read_missing_uri_is_resource_not_found() {
        let module = ResourcesModule::new(Duration::ZERO);
        let err = module.read("foo://missing").await.unwrap_err();
        assert_eq!(err.rpc_code(), crate::protocol::types::error_codes::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn update_resource_is_silent_when_not_subscribed() {
        let module = ResourcesModule::new(Duration::ZERO);
        // No peer installed, no subscription: this must not panic and
        // schedule nothing observable.
        module.update_resource("foo://x").await;
    }

    #[tokio::test]
    async fn n_in_window_updates_yield_at_most_two_notifications() {
        let (peer, mut outbound) = Peer::new();
        let module = ResourcesModule::new(Duration::ZERO);
        let mut registry = crate::core::capability::CapabilityRegistry::new();
        module.install(&peer, &mut registry);
        module.state.lock().await.subscriptions.insert("foo://x".to_string());

        for _ in 0..5 {
            module.update_resource("foo://x").await;
        }

        let mut count = 0;
        while let Ok(Some(_)) =
            tokio::time::timeout(Duration::from_millis(50), outbound.recv()).await
        {
            count += 1;
        }
        assert!(count <= 2, "expected at most 2 notifications, got {count}");
        assert!(count >= 1);
    }
}
