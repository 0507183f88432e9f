//! Completions subsystem, server-side. Supplements the core spec: answers
//! `completion/complete` by delegating to a caller-supplied handler, keyed
//! by whether the reference being completed is a prompt or a resource.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::core::capability::CapabilityRegistry;
use crate::core::error::McpResult;
use crate::core::peer::{BoxFuture, HandlerError, Peer};
use crate::protocol::methods as m;
use crate::protocol::types::{CompleteResult, CompletionArgument, CompletionReference, CompletionValues};

#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn complete(&self, reference: &CompletionReference, argument: &CompletionArgument) -> McpResult<Vec<String>>;
}

/// Prefix/substring matcher over a static candidate list, the common case
/// for completing prompt names or enumerable argument values.
pub struct StaticCompletionHandler {
    prompt_names: Vec<String>,
    prompt_argument_values: Vec<(String, String, Vec<String>)>,
}

impl StaticCompletionHandler {
    pub fn new(prompt_names: Vec<String>) -> Self {
        Self {
            prompt_names,
            prompt_argument_values: Vec::new(),
        }
    }

    pub fn with_argument_values(mut self, prompt_name: impl Into<String>, argument_name: impl Into<String>, values: Vec<String>) -> Self {
        self.prompt_argument_values.push((prompt_name.into(), argument_name.into(), values));
        self
    }

    fn matching(candidates: &[String], prefix: &str) -> Vec<String> {
        candidates.iter().filter(|c| c.starts_with(prefix)).take(100).cloned().collect()
    }
}

#[async_trait]
impl CompletionHandler for StaticCompletionHandler {
    async fn complete(&self, reference: &CompletionReference, argument: &CompletionArgument) -> McpResult<Vec<String>> {
        match reference {
            CompletionReference::Prompt { name } => {
                if argument.name == "name" {
                    return Ok(Self::matching(&self.prompt_names, &argument.value));
                }
                let values = self
                    .prompt_argument_values
                    .iter()
                    .find(|(p, a, _)| p == name && a == &argument.name)
                    .map(|(_, _, values)| values.clone())
                    .unwrap_or_default();
                Ok(Self::matching(&values, &argument.value))
            }
            CompletionReference::Resource { .. } => Ok(Vec::new()),
        }
    }
}

pub struct CompletionsModule {
    handler: Mutex<Option<Arc<dyn CompletionHandler>>>,
    peer: Mutex<Option<Arc<Peer>>>,
}

impl CompletionsModule {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handler: Mutex::new(None),
            peer: Mutex::new(None),
        })
    }

    pub fn install(self: &Arc<Self>, peer: &Arc<Peer>, registry: &mut CapabilityRegistry) {
        *self.peer.lock().unwrap() = Some(peer.clone());
        registry.enable_completions();

        let this = self.clone();
        peer.register_request_handler(m::COMPLETION_COMPLETE, Arc::new(move |params| this.clone().handle_complete(params)));
    }

    pub fn set_handler(&self, handler: Arc<dyn CompletionHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn handle_complete(self: Arc<Self>, params: Value) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize)]
            struct CompleteParams {
                #[serde(rename = "ref")]
                reference: CompletionReference,
                argument: CompletionArgument,
            }
            let request: CompleteParams = serde_json::from_value(params)
                .map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INVALID_PARAMS, e.to_string()))?;

            let handler = self.handler.lock().unwrap().clone();
            let values = match handler {
                Some(handler) => handler.complete(&request.reference, &request.argument).await.map_err(HandlerError::from)?,
                None => Vec::new(),
            };

            let result = CompleteResult {
                completion: CompletionValues {
                    total: Some(values.len() as i64),
                    has_more: Some(false),
                    values,
                },
            };
            serde_json::to_value(result).map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INTERNAL_ERROR, e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prefix_matches_prompt_names() {
        let handler = StaticCompletionHandler::new(vec!["analyze_data".into(), "analyze_text".into(), "create_report".into()]);
        let reference = CompletionReference::Prompt { name: "x".into() };
        let argument = CompletionArgument { name: "name".into(), value: "ana".into() };
        let results = handler.complete(&reference, &argument).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn argument_values_are_scoped_to_their_prompt() {
        let handler = StaticCompletionHandler::new(vec!["analyze".into()])
            .with_argument_values("analyze", "format", vec!["json".into(), "xml".into(), "yaml".into()]);
        let reference = CompletionReference::Prompt { name: "analyze".into() };
        let argument = CompletionArgument { name: "format".into(), value: "j".into() };
        let results = handler.complete(&reference, &argument).await.unwrap();
        assert_eq!(results, vec!["json".to_string()]);
    }

    #[tokio::test]
    async fn resource_references_are_unhandled_by_default() {
        let handler = StaticCompletionHandler::new(vec![]);
        let reference = CompletionReference::Resource { uri: "foo://x".into() };
        let argument = CompletionArgument { name: "uri".into(), value: "".into() };
        assert!(handler.complete(&reference, &argument).await.unwrap().is_empty());
    }
}
