//! Server error types and their JSON-RPC mapping

use flowmcp_protocol::jsonrpc::JsonRpcErrorCode;
use flowmcp_protocol::ProtocolError;

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Error type returned by registered handlers.
///
/// Anything convertible into a boxed error works with `?` inside handler
/// bodies; the capability decides how the failure surfaces (tool-level
/// `isError` for tools, `INTERNAL_ERROR` for resources and prompts).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Server error taxonomy.
///
/// Dispatch-level variants map onto the standard JSON-RPC codes; transport
/// variants surface as HTTP statuses before any frame is produced.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Unresolved path in the export table
    #[error("rpc method `{0}` not found")]
    MethodNotFound(String),

    /// Prototype validation failure, unknown resource, unknown completion
    #[error("{0}")]
    InvalidParams(String),

    /// Handler failure outside a tool call
    #[error("{0}")]
    Internal(String),

    /// Invalid registration (bad chunk size, malformed URI template, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Protocol layer failure
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// IO errors from the transport layer
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// JSON-RPC error code for this failure
    pub fn jsonrpc_code(&self) -> JsonRpcErrorCode {
        match self {
            Self::MethodNotFound(_) => JsonRpcErrorCode::MethodNotFound,
            Self::InvalidParams(_) => JsonRpcErrorCode::InvalidParams,
            _ => JsonRpcErrorCode::InternalError,
        }
    }
}
