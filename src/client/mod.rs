//! Client-side peer composition: [`McpClient::connect`] drives the
//! `initialize`/`initialized` handshake and hands back a handle for issuing
//! further requests against one connected server.

pub mod mcp_client;

pub use mcp_client::{
    ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, McpClient, ReadResourceResult,
};
