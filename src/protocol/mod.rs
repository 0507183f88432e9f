//! JSON-RPC 2.0 envelope and MCP wire type model.
//!
//! This module is intentionally inert: it defines shapes and constants. The
//! behavior that interprets them — dispatch, correlation, capability gating —
//! lives in [`crate::core`].

pub mod messages;
pub mod methods;
pub mod roots_types;
pub mod types;
pub mod version;

pub use messages::{
    IncomingMessage, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JSONRPC_VERSION,
};
pub use roots_types::{ListRootsResult, Root};
pub use version::ProtocolVersion;
