//! A peer-symmetric runtime for the Model Context Protocol (MCP) over
//! JSON-RPC 2.0.
//!
//! The core is a [`core::peer::Peer`]: one object that correlates outbound
//! requests with their responses, dispatches inbound requests to registered
//! handlers, and fans inbound notifications out to listeners. Servers and
//! clients don't reimplement any of that — they compose a set of
//! capability modules (tools, resources, prompts, completions, roots,
//! utility streams) onto a `Peer`, gated by a [`core::capability::CapabilityRegistry`]
//! that rejects outbound calls to methods the remote side never advertised.
//!
//! ## Module organization
//!
//! - [`core`]: the peer, capability gating, schema validation, and the
//!   per-subsystem capability modules.
//! - [`protocol`]: wire types — envelopes, capability records, the MCP data
//!   model, method name constants, and protocol version negotiation.
//! - [`server`]: [`server::McpServer`], composing the server-side capability
//!   modules onto a peer per connection.
//! - [`client`]: [`client::McpClient`], driving the handshake as the
//!   request-sender and wrapping typed request methods around the peer.
//! - [`transport`]: byte-stream sources (`stdio`, a spawned child process)
//!   that feed a peer's read/write loop.
//! - [`utils`]: pagination, URI template matching, and logging setup shared
//!   across the above.
//!
//! Streamable HTTP, WebSocket, and authorization are out of scope; every
//! deployment here is a newline-delimited JSON stream over stdio.

pub mod client;
pub mod core;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod utils;

pub use core::error::{McpError, McpResult};
pub use core::peer::Peer;

/// Convenience re-exports for embedders wiring up a server or client.
pub mod prelude {
    pub use crate::core::{
        capability::CapabilityRegistry,
        completion::{CompletionHandler, CompletionsModule, StaticCompletionHandler},
        error::{McpError, McpResult},
        peer::Peer,
        prompt::{PromptHandler, PromptsModule},
        resource::ResourcesModule,
        roots::RootsModule,
        streams::StreamsModule,
        tool::{ToolHandler, ToolsModule},
    };

    pub use crate::protocol::methods;
    pub use crate::protocol::messages::*;
    pub use crate::protocol::roots_types::{ListRootsResult, Root};
    pub use crate::protocol::types::*;
    pub use crate::protocol::version::ProtocolVersion;

    pub use crate::client::McpClient;
    pub use crate::server::McpServer;

    pub use crate::transport::{ChildProcessTransport, StdioTransport};

    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};
    pub use std::collections::HashMap;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_exports_resolve() {
        let _error = McpError::Protocol("test".to_string());
    }
}
