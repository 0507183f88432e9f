//! Error types for the MCP peer runtime.
//!
//! A single enum covers every failure family the core can raise: transport,
//! protocol, validation, capability, and not-found. Handler-raised domain
//! errors are converted to JSON-RPC error responses at the peer's dispatch
//! boundary rather than propagated as Rust panics.

use thiserror::Error;

/// The crate-wide error type.
#[derive(Error, Debug, Clone)]
pub enum McpError {
    /// The transport was closed, or failed before a write/read completed.
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    /// A malformed envelope, unexpected response, or other protocol-level violation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A schema validation failure. Carries the ordered list of failure messages
    /// already formatted per the validator's wording contract.
    #[error("Validation failed: {0:?}")]
    Validation(Vec<String>),

    /// Local capability gating rejected a call before it reached the transport.
    #[error("Capability not supported: {0}")]
    Capability(String),

    /// Protocol version negotiation could not produce an acceptable version.
    #[error("Version negotiation failed: {0}")]
    VersionNegotiation(String),

    /// Requested tool is not registered.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Requested resource matched no exact entry or template handler.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Requested prompt is not registered.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// No handler is registered for an inbound method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Params failed a structural check unrelated to tool-schema validation.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// A handler raised a failure with no more specific category.
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O failure underneath the transport.
    #[error("I/O error: {0}")]
    Io(String),

    /// URI parse failure.
    #[error("Invalid URI: {0}")]
    Url(String),
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<url::ParseError> for McpError {
    fn from(err: url::ParseError) -> Self {
        McpError::Url(err.to_string())
    }
}

/// Result type alias used throughout the crate.
pub type McpResult<T> = Result<T, McpError>;

impl McpError {
    /// Category tag for structured logging.
    pub fn category(&self) -> &'static str {
        match self {
            McpError::TransportClosed(_) => "transport",
            McpError::Protocol(_) => "protocol",
            McpError::Serialization(_) => "serialization",
            McpError::Validation(_) => "validation",
            McpError::Capability(_) => "capability",
            McpError::VersionNegotiation(_) => "version_negotiation",
            McpError::ToolNotFound(_) => "not_found",
            McpError::ResourceNotFound(_) => "not_found",
            McpError::PromptNotFound(_) => "not_found",
            McpError::MethodNotFound(_) => "not_found",
            McpError::InvalidParams(_) => "validation",
            McpError::Internal(_) => "internal",
            McpError::Io(_) => "io",
            McpError::Url(_) => "validation",
        }
    }

    /// Maps this error onto the JSON-RPC error code it should be reported as,
    /// when surfaced as a response rather than consumed internally.
    pub fn rpc_code(&self) -> i64 {
        use crate::protocol::types::error_codes;
        match self {
            McpError::Protocol(_) => error_codes::INVALID_REQUEST,
            McpError::Serialization(_) => error_codes::PARSE_ERROR,
            McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParams(_) | McpError::Validation(_) => error_codes::INVALID_PARAMS,
            McpError::ResourceNotFound(_) => error_codes::RESOURCE_NOT_FOUND,
            McpError::Capability(_) => error_codes::CAPABILITY_NOT_SUPPORTED,
            _ => error_codes::INTERNAL_ERROR,
        }
    }
}
