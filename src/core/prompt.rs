//! Prompt subsystem, server-side. Supplements the core spec: prompts are
//! server-owned message templates, listed and fetched the same way tools
//! and resources are, with pagination and a list-changed notification.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::capability::CapabilityRegistry;
use crate::core::error::{McpError, McpResult};
use crate::core::peer::{BoxFuture, HandlerError, Peer};
use crate::protocol::methods as m;
use crate::protocol::types::{Cursor, GetPromptResult, PaginatedRequestParams, PromptInfo};
use crate::utils::pagination::{paginate, Page};

const PAGE_SIZE: usize = 50;

#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(&self, arguments: HashMap<String, Value>) -> McpResult<GetPromptResult>;
}

struct RegisteredPrompt {
    info: PromptInfo,
    handler: Arc<dyn PromptHandler>,
}

struct PromptState {
    prompts: Vec<RegisteredPrompt>,
}

pub struct PromptsModule {
    state: Mutex<PromptState>,
    peer: Mutex<Option<Arc<Peer>>>,
}

impl PromptsModule {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PromptState { prompts: Vec::new() }),
            peer: Mutex::new(None),
        })
    }

    pub fn install(self: &Arc<Self>, peer: &Arc<Peer>, registry: &mut CapabilityRegistry) {
        *self.peer.lock().unwrap() = Some(peer.clone());
        registry.enable_prompts(true);

        let this = self.clone();
        peer.register_request_handler(m::PROMPTS_LIST, Arc::new(move |params| this.clone().handle_list(params)));
        let this = self.clone();
        peer.register_request_handler(m::PROMPTS_GET, Arc::new(move |params| this.clone().handle_get(params)));
    }

    pub fn register_prompt(&self, info: PromptInfo, handler: Arc<dyn PromptHandler>) {
        let mut state = self.state.lock().unwrap();
        let name = info.name.clone();
        state.prompts.retain(|p| p.info.name != name);
        state.prompts.push(RegisteredPrompt { info, handler });
        drop(state);
        if let Some(peer) = self.peer.lock().unwrap().as_ref() {
            let _ = peer.send_notification(m::PROMPTS_LIST_CHANGED, None);
        }
    }

    pub fn unregister_prompt(&self, name: &str) {
        self.state.lock().unwrap().prompts.retain(|p| p.info.name != name);
        if let Some(peer) = self.peer.lock().unwrap().as_ref() {
            let _ = peer.send_notification(m::PROMPTS_LIST_CHANGED, None);
        }
    }

    /// Looks up `name`, checks its declared required arguments are present,
    /// then delegates to the handler.
    pub async fn get(&self, name: &str, arguments: HashMap<String, Value>) -> McpResult<GetPromptResult> {
        let found = {
            let state = self.state.lock().unwrap();
            state.prompts.iter().find(|p| p.info.name == name).map(|p| (p.info.clone(), p.handler.clone()))
        };
        let Some((info, handler)) = found else {
            return Err(McpError::PromptNotFound(name.to_string()));
        };

        if let Some(args) = &info.arguments {
            for arg in args {
                if arg.required.unwrap_or(false) && !arguments.contains_key(&arg.name) {
                    return Err(McpError::InvalidParams(format!(
                        "required argument \"{}\" missing for prompt \"{name}\"",
                        arg.name
                    )));
                }
            }
        }

        handler.get(arguments).await
    }

    fn handle_list(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            let request: PaginatedRequestParams = parse_params(params)?;
            let prompts: Vec<PromptInfo> = {
                let state = self.state.lock().unwrap();
                state.prompts.iter().map(|p| p.info.clone()).collect()
            };
            let Page { items, next_cursor } = paginate(prompts, request.cursor.as_deref(), PAGE_SIZE);
            Ok(json_result(items, next_cursor))
        })
    }

    fn handle_get(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize)]
            struct GetParams {
                name: String,
                #[serde(default)]
                arguments: HashMap<String, Value>,
            }
            let request: GetParams = parse_params(params)?;
            let result = self.get(&request.name, request.arguments).await.map_err(HandlerError::from)?;
            serde_json::to_value(result).map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INTERNAL_ERROR, e.to_string()))
        })
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, HandlerError> {
    serde_json::from_value(value)
        .map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INVALID_PARAMS, e.to_string()))
}

fn json_result(prompts: Vec<PromptInfo>, next_cursor: Option<Cursor>) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("prompts".to_string(), serde_json::to_value(prompts).unwrap());
    if let Some(cursor) = next_cursor {
        obj.insert("nextCursor".to_string(), Value::String(cursor));
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{ContentBlock, PromptArgument, PromptMessage, Role};
    use serde_json::json;

    struct GreetingHandler;

    #[async_trait]
    impl PromptHandler for GreetingHandler {
        async fn get(&self, arguments: HashMap<String, Value>) -> McpResult<GetPromptResult> {
            let name = arguments.get("name").and_then(|v| v.as_str()).unwrap_or("World");
            Ok(GetPromptResult {
                description: Some("greeting".to_string()),
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: ContentBlock::text(format!("Hello, {name}!")),
                }],
            })
        }
    }

    fn greeting_info(required: bool) -> PromptInfo {
        PromptInfo {
            name: "greeting".to_string(),
            description: None,
            arguments: Some(vec![PromptArgument {
                name: "name".to_string(),
                description: None,
                required: Some(required),
            }]),
        }
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected_before_handler_runs() {
        let module = PromptsModule::new();
        module.register_prompt(greeting_info(true), Arc::new(GreetingHandler));
        let err = module.get("greeting", HashMap::new()).await.unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[tokio::test]
    async fn optional_argument_may_be_omitted() {
        let module = PromptsModule::new();
        module.register_prompt(greeting_info(false), Arc::new(GreetingHandler));
        let result = module.get("greeting", HashMap::new()).await.unwrap();
        match &result.messages[0].content {
            ContentBlock::Text { text, .. } => assert!(text.contains("World")),
            _ => panic!("expected text"),
        }
    }

    #[tokio::test]
    async fn unknown_prompt_is_prompt_not_found() {
        let module = PromptsModule::new();
        let err = module.get("missing", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, McpError::PromptNotFound(_)));
    }

    #[tokio::test]
    async fn list_returns_registered_prompts() {
        let module = PromptsModule::new();
        module.register_prompt(greeting_info(true), Arc::new(GreetingHandler));
        let mut args = HashMap::new();
        args.insert("name".to_string(), json!("Ada"));
        let result = module.get("greeting", args).await.unwrap();
        assert_eq!(result.messages.len(), 1);
    }
}
