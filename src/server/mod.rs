//! Server-side peer composition: an [`McpServer`] holds one instance of each
//! capability module and composes them onto a fresh peer per connection.

pub mod mcp_server;

pub use mcp_server::McpServer;
