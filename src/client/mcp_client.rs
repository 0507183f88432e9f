//! Client-side peer composition (component E's client half).
//!
//! `McpClient::connect` performs the `initialize`/`initialized` handshake as
//! the request-sender, then hands back a handle whose methods are thin
//! wrappers over [`Peer::send_request`] gated by [`CapabilityRegistry::check_outbound`].
//! The actual read/write loop runs on a spawned task for the handle's
//! lifetime; callers drive requests concurrently with it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::core::capability::CapabilityRegistry;
use crate::core::error::{McpError, McpResult};
use crate::core::lifecycle::{Lifecycle, LifecycleState};
use crate::core::peer::Peer;
use crate::core::roots::RootsModule;
use crate::core::streams::StreamsModule;
use crate::protocol::methods as m;
use crate::protocol::types::{
    CallToolResult, CompleteResult, CompletionArgument, CompletionReference, Cursor, GetPromptResult, Implementation, InitializeRequestParams,
    InitializeResult, LoggingLevel, PaginatedRequestParams, PromptInfo, Resource, ResourceContents, ResourceTemplate, Tool,
};
use crate::protocol::version::ProtocolVersion;

#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListResourcesResult {
    pub resources: Vec<Resource>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListResourceTemplatesResult {
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPromptsResult {
    pub prompts: Vec<PromptInfo>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<Cursor>,
}

/// A live connection to one MCP server: the negotiated protocol version, the
/// server's advertised capabilities, and the peer that carries every
/// subsequent request.
pub struct McpClient {
    client_info: Implementation,
    server_info: Implementation,
    protocol_version: ProtocolVersion,
    peer: Arc<Peer>,
    registry: Mutex<CapabilityRegistry>,
    lifecycle: Arc<Lifecycle>,
    roots: Arc<RootsModule>,
    streams: Arc<StreamsModule>,
    run_task: Mutex<Option<JoinHandle<McpResult<()>>>>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("client_info", &self.client_info)
            .field("server_info", &self.server_info)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Runs the `initialize`/`initialized` handshake over `reader`/`writer`
    /// and spawns the read/write loop in the background. Roots registered
    /// before or after connecting are fanned out to this server as usual.
    /// Accepts any version this crate understands ([`ProtocolVersion::ALL`]);
    /// use [`Self::connect_with_supported_versions`] to restrict that set.
    pub async fn connect<R, W>(client_info: Implementation, roots: Arc<RootsModule>, reader: R, writer: W) -> McpResult<Arc<McpClient>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::connect_with_supported_versions(client_info, roots, reader, writer, &ProtocolVersion::ALL).await
    }

    /// Like [`Self::connect`], but closes the connection without ever
    /// sending `notifications/initialized` if the server negotiates a
    /// version outside `supported_versions` (§4.E, scenario S6): a
    /// recognized version this particular client still refuses to speak.
    pub async fn connect_with_supported_versions<R, W>(
        client_info: Implementation,
        roots: Arc<RootsModule>,
        reader: R,
        writer: W,
        supported_versions: &[ProtocolVersion],
    ) -> McpResult<Arc<McpClient>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (peer, outbound_rx) = Peer::new();
        let lifecycle = Arc::new(Lifecycle::new());
        peer.set_lifecycle(lifecycle.clone());
        let mut registry = CapabilityRegistry::new();

        roots.install(&peer, &mut registry);
        let streams = StreamsModule::new();
        streams.install(&peer, false);

        lifecycle.set(LifecycleState::Initializing);

        let run_task = tokio::spawn(peer.clone().run(reader, writer, outbound_rx));

        let init_params = InitializeRequestParams {
            protocol_version: ProtocolVersion::LATEST.as_str().to_string(),
            capabilities: registry.local.client.clone(),
            client_info: client_info.clone(),
        };
        let response = peer.send_request(m::INITIALIZE, Some(serde_json::to_value(init_params)?)).await?;
        let result: InitializeResult = serde_json::from_value(response)?;

        let negotiated = ProtocolVersion::parse(&result.protocol_version)
            .ok_or_else(|| McpError::VersionNegotiation(format!("server proposed unknown version {}", result.protocol_version)))?;

        if !supported_versions.contains(&negotiated) {
            peer.shutdown();
            run_task.abort();
            return Err(McpError::VersionNegotiation(format!(
                "server negotiated {negotiated}, which is outside this client's supported set"
            )));
        }

        registry.set_remote_server(result.capabilities);
        peer.send_notification(m::INITIALIZED, None)?;
        lifecycle.set(LifecycleState::Active);

        Ok(Arc::new(McpClient {
            client_info,
            server_info: result.server_info,
            protocol_version: negotiated,
            peer,
            registry: Mutex::new(registry),
            lifecycle,
            roots,
            streams,
            run_task: Mutex::new(Some(run_task)),
        }))
    }

    pub fn client_info(&self) -> &Implementation {
        &self.client_info
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn roots(&self) -> &Arc<RootsModule> {
        &self.roots
    }

    pub fn streams(&self) -> &Arc<StreamsModule> {
        &self.streams
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Registers a handler the client will invoke for a server-initiated
    /// request (e.g. `sampling/createMessage`, `elicitation/create`) that has
    /// no dedicated module of its own. The host application owns the schema
    /// for these — this crate only carries the capability gate.
    pub fn register_server_request_handler(&self, method: &'static str, handler: crate::core::peer::RequestHandler) {
        self.peer.register_request_handler(method, handler);
    }

    async fn request<P: Serialize, T: for<'de> Deserialize<'de>>(&self, method: &str, params: Option<P>) -> McpResult<T> {
        let params = params.map(|p| serde_json::to_value(p)).transpose()?;
        let response = self.call_raw(method, params).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Sends a request for a method with no dedicated typed wrapper, still
    /// gated by the capability registry like every other outbound call.
    pub async fn call_raw(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        self.registry.lock().unwrap().check_outbound(method)?;
        self.peer.send_request(method, params).await
    }

    pub async fn list_tools(&self, cursor: Option<Cursor>) -> McpResult<ListToolsResult> {
        self.request(m::TOOLS_LIST, Some(PaginatedRequestParams { cursor })).await
    }

    pub async fn call_tool(&self, name: impl Into<String>, arguments: HashMap<String, Value>) -> McpResult<CallToolResult> {
        #[derive(Serialize)]
        struct CallToolParams {
            name: String,
            arguments: HashMap<String, Value>,
        }
        self.request(m::TOOLS_CALL, Some(CallToolParams { name: name.into(), arguments })).await
    }

    pub async fn list_resources(&self, cursor: Option<Cursor>) -> McpResult<ListResourcesResult> {
        self.request(m::RESOURCES_LIST, Some(PaginatedRequestParams { cursor })).await
    }

    pub async fn list_resource_templates(&self, cursor: Option<Cursor>) -> McpResult<ListResourceTemplatesResult> {
        self.request(m::RESOURCES_TEMPLATES_LIST, Some(PaginatedRequestParams { cursor })).await
    }

    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResult> {
        #[derive(Serialize)]
        struct ReadResourceParams {
            uri: String,
        }
        self.request(m::RESOURCES_READ, Some(ReadResourceParams { uri: uri.into() })).await
    }

    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        #[derive(Serialize)]
        struct SubscribeParams {
            uri: String,
        }
        let _: Value = self.request(m::RESOURCES_SUBSCRIBE, Some(SubscribeParams { uri: uri.into() })).await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        #[derive(Serialize)]
        struct UnsubscribeParams {
            uri: String,
        }
        let _: Value = self.request(m::RESOURCES_UNSUBSCRIBE, Some(UnsubscribeParams { uri: uri.into() })).await?;
        Ok(())
    }

    pub async fn list_prompts(&self, cursor: Option<Cursor>) -> McpResult<ListPromptsResult> {
        self.request(m::PROMPTS_LIST, Some(PaginatedRequestParams { cursor })).await
    }

    pub async fn get_prompt(&self, name: impl Into<String>, arguments: HashMap<String, String>) -> McpResult<GetPromptResult> {
        #[derive(Serialize)]
        struct GetPromptParams {
            name: String,
            #[serde(skip_serializing_if = "HashMap::is_empty")]
            arguments: HashMap<String, String>,
        }
        self.request(m::PROMPTS_GET, Some(GetPromptParams { name: name.into(), arguments })).await
    }

    pub async fn complete(&self, reference: CompletionReference, argument: CompletionArgument) -> McpResult<CompleteResult> {
        #[derive(Serialize)]
        struct CompleteParams {
            #[serde(rename = "ref")]
            reference: CompletionReference,
            argument: CompletionArgument,
        }
        self.request(m::COMPLETION_COMPLETE, Some(CompleteParams { reference, argument })).await
    }

    pub async fn set_logging_level(&self, level: LoggingLevel) -> McpResult<()> {
        #[derive(Serialize)]
        struct SetLevelParams {
            level: LoggingLevel,
        }
        let _: Value = self.request(m::LOGGING_SET_LEVEL, Some(SetLevelParams { level })).await?;
        Ok(())
    }

    pub async fn ping(&self) -> McpResult<()> {
        let _ = self.call_raw(m::PING, None).await?;
        Ok(())
    }

    /// True once the underlying peer has closed, meaning every further
    /// request will fail with [`McpError::TransportClosed`].
    pub fn is_closed(&self) -> bool {
        self.peer.is_closed()
    }

    /// Waits for the background read/write loop to finish, e.g. after the
    /// server closes the transport. Returns an error only if that loop
    /// itself failed; a clean EOF-driven shutdown returns `Ok(())`.
    pub async fn join(&self) -> McpResult<()> {
        let task = self.run_task.lock().unwrap().take();
        match task {
            Some(task) => task.await.map_err(|e| McpError::Internal(e.to_string()))?,
            None => Ok(()),
        }
    }
}
