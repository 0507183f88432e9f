//! Server-side peer composition (component E's server half).
//!
//! An `McpServer` owns one instance of each capability module and composes
//! them onto a fresh [`Peer`] per connection via [`McpServer::serve`]. It does
//! not itself hold tools/resources/prompts — those live on the modules,
//! reachable through the accessors below so callers register handlers before
//! (or even while) a connection is being served.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::capability::CapabilityRegistry;
use crate::core::completion::CompletionsModule;
use crate::core::error::McpResult;
use crate::core::lifecycle::{Lifecycle, LifecycleState};
use crate::core::peer::{BoxFuture, HandlerError, Peer};
use crate::core::prompt::PromptsModule;
use crate::core::resource::{ResourcesModule, DEFAULT_THROTTLE_DELAY};
use crate::core::streams::StreamsModule;
use crate::core::tool::ToolsModule;
use crate::protocol::methods as m;
use crate::protocol::types::{error_codes, Implementation, InitializeRequestParams, InitializeResult, ServerCapabilities};
use crate::protocol::version::ProtocolVersion;

/// A server endpoint: one set of capability modules, served over as many
/// connections as the embedding process opens.
pub struct McpServer {
    info: Implementation,
    instructions: Option<String>,
    lifecycle: Arc<Lifecycle>,
    tools: Arc<ToolsModule>,
    resources: Arc<ResourcesModule>,
    prompts: Arc<PromptsModule>,
    completions: Arc<CompletionsModule>,
    streams: Arc<StreamsModule>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation { name: name.into(), version: version.into() },
            instructions: None,
            lifecycle: Arc::new(Lifecycle::new()),
            tools: ToolsModule::new(),
            resources: ResourcesModule::new(DEFAULT_THROTTLE_DELAY),
            prompts: PromptsModule::new(),
            completions: CompletionsModule::new(),
            streams: StreamsModule::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tools(&self) -> &Arc<ToolsModule> {
        &self.tools
    }

    pub fn resources(&self) -> &Arc<ResourcesModule> {
        &self.resources
    }

    pub fn prompts(&self) -> &Arc<PromptsModule> {
        &self.prompts
    }

    pub fn completions(&self) -> &Arc<CompletionsModule> {
        &self.completions
    }

    pub fn streams(&self) -> &Arc<StreamsModule> {
        &self.streams
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Runs one connection to completion: installs every capability module
    /// on a fresh peer, handles the `initialize`/`initialized` handshake, then
    /// drives the read/write loop until the transport closes.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> McpResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (peer, outbound_rx) = Peer::new();
        peer.set_lifecycle(self.lifecycle.clone());
        let mut registry = CapabilityRegistry::new();

        self.tools.install(&peer, &mut registry);
        self.resources.install(&peer, &mut registry);
        self.prompts.install(&peer, &mut registry);
        self.completions.install(&peer, &mut registry);
        registry.enable_logging();
        self.streams.install(&peer, true);

        let local_capabilities = registry.local.server.clone();

        let this = self.clone();
        peer.register_request_handler(
            m::INITIALIZE,
            Arc::new(move |params| this.clone().handle_initialize(params, local_capabilities.clone())),
        );

        let lifecycle = self.lifecycle.clone();
        peer.register_notification_handler(
            m::INITIALIZED,
            Arc::new(move |_params| {
                let lifecycle = lifecycle.clone();
                Box::pin(async move { lifecycle.set(LifecycleState::Active) })
            }),
        );

        peer.run(reader, writer, outbound_rx).await
    }

    fn handle_initialize(
        self: Arc<Self>,
        params: serde_json::Value,
        local_capabilities: ServerCapabilities,
    ) -> BoxFuture<'static, Result<serde_json::Value, HandlerError>> {
        Box::pin(async move {
            let request: InitializeRequestParams = serde_json::from_value(params)
                .map_err(|e| HandlerError::new(error_codes::INVALID_PARAMS, e.to_string()))?;

            self.lifecycle.set(LifecycleState::Initializing);

            let negotiated = ProtocolVersion::parse(&request.protocol_version)
                .map(ProtocolVersion::negotiate)
                .unwrap_or(ProtocolVersion::OLDEST);

            let result = InitializeResult {
                protocol_version: negotiated.as_str().to_string(),
                capabilities: local_capabilities,
                server_info: self.info.clone(),
                instructions: self.instructions.clone(),
            };
            serde_json::to_value(result).map_err(|e| HandlerError::new(error_codes::INTERNAL_ERROR, e.to_string()))
        })
    }
}
