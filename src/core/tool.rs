//! Tool subsystem, server-side (component G).
//!
//! Owns the tool registry and the call pipeline: look up by name, validate
//! arguments against the tool's input schema, invoke, normalize the result.
//! A validation failure is reported as `CallToolResult{isError:true,...}`,
//! never as a JSON-RPC error — only the handler's own failures (or an
//! unknown tool name) take that shape too, per §4.G.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::capability::CapabilityRegistry;
use crate::core::peer::{BoxFuture, HandlerError, Peer};
use crate::core::validation;
use crate::protocol::methods as m;
use crate::protocol::types::{CallToolResult, Cursor, PaginatedRequestParams, Tool};
use crate::utils::pagination::{paginate, Page};

const PAGE_SIZE: usize = 50;

/// Implements a single tool's behavior. Arguments have already passed schema
/// validation (if enabled for this tool) by the time `call` runs.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: HashMap<String, Value>) -> CallToolResult;
}

struct RegisteredTool {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
    validate_arguments: bool,
}

struct ToolState {
    tools: Vec<RegisteredTool>,
}

/// Server-side tool registry. Install once per server peer via
/// [`ToolsModule::install`].
pub struct ToolsModule {
    state: Mutex<ToolState>,
    peer: Mutex<Option<Arc<Peer>>>,
}

impl ToolsModule {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ToolState { tools: Vec::new() }),
            peer: Mutex::new(None),
        })
    }

    pub fn install(self: &Arc<Self>, peer: &Arc<Peer>, registry: &mut CapabilityRegistry) {
        *self.peer.lock().unwrap() = Some(peer.clone());
        registry.enable_tools(true);

        let this = self.clone();
        peer.register_request_handler(m::TOOLS_LIST, Arc::new(move |params| this.clone().handle_list(params)));
        let this = self.clone();
        peer.register_request_handler(m::TOOLS_CALL, Arc::new(move |params| this.clone().handle_call(params)));
    }

    /// Registers or replaces a tool by name. `validate_arguments` controls
    /// whether `tool.input_schema` gates invocation.
    pub fn register_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>, validate_arguments: bool) {
        let mut state = self.state.lock().unwrap();
        let name = tool.name.clone();
        state.tools.retain(|t| t.tool.name != name);
        state.tools.push(RegisteredTool {
            tool,
            handler,
            validate_arguments,
        });
        drop(state);
        self.notify_list_changed();
    }

    pub fn unregister_tool(&self, name: &str) {
        self.state.lock().unwrap().tools.retain(|t| t.tool.name != name);
        self.notify_list_changed();
    }

    fn notify_list_changed(&self) {
        if let Some(peer) = self.peer.lock().unwrap().as_ref() {
            let _ = peer.send_notification(m::TOOLS_LIST_CHANGED, None);
        }
    }

    /// Runs the call pipeline for `name` with `arguments`, never returning a
    /// `McpError` — unknown tools and validation failures both surface as an
    /// error-flagged `CallToolResult`.
    pub async fn call(&self, name: &str, arguments: HashMap<String, Value>) -> CallToolResult {
        let found = {
            let state = self.state.lock().unwrap();
            state
                .tools
                .iter()
                .find(|t| t.tool.name == name)
                .map(|t| (t.tool.input_schema.clone(), t.handler.clone(), t.validate_arguments))
        };

        let Some((schema, handler, validate_arguments)) = found else {
            return CallToolResult::error(format!("Tool not found: {name}"));
        };

        if validate_arguments {
            let schema_value = schema.as_value();
            let args_value = Value::Object(arguments.clone().into_iter().collect());
            let failures = validation::validate(&schema_value, &args_value);
            if !failures.is_empty() {
                let joined = failures.into_iter().map(|f| f.message).collect::<Vec<_>>().join("; ");
                return CallToolResult::error(joined);
            }
        }

        handler.call(arguments).await
    }

    fn handle_list(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            let request: PaginatedRequestParams = parse_params(params)?;
            let tools: Vec<Tool> = {
                let state = self.state.lock().unwrap();
                state.tools.iter().map(|t| t.tool.clone()).collect()
            };
            let Page { items, next_cursor } = paginate(tools, request.cursor.as_deref(), PAGE_SIZE);
            Ok(json_result(items, next_cursor))
        })
    }

    fn handle_call(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize)]
            struct CallParams {
                name: String,
                #[serde(default)]
                arguments: HashMap<String, Value>,
            }
            let request: CallParams = parse_params(params)?;
            let result = self.call(&request.name, request.arguments).await;
            serde_json::to_value(result).map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INTERNAL_ERROR, e.to_string()))
        })
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, HandlerError> {
    serde_json::from_value(value)
        .map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INVALID_PARAMS, e.to_string()))
}

fn json_result(tools: Vec<Tool>, next_cursor: Option<Cursor>) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("tools".to_string(), serde_json::to_value(tools).unwrap());
    if let Some(cursor) = next_cursor {
        obj.insert("nextCursor".to_string(), Value::String(cursor));
    }
    Value::Object(obj)
}
