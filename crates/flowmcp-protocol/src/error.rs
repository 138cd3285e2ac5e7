//! Protocol-level error types

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised by the protocol layer itself (framing and encoding).
///
/// Dispatch-level failures (method not found, invalid params, ...) are not
/// errors here: they are regular [`crate::jsonrpc::JsonRpcError`] frames.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A frame could not be serialized or deserialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A frame had none of the request/notification/response shapes
    #[error("invalid JSON-RPC frame: {0}")]
    InvalidFrame(String),

    /// Streaming chunk size would let base64 pad mid-stream
    #[error("chunk size {0} is not a multiple of 3")]
    InvalidChunkSize(usize),

    /// A text stream produced bytes that are not valid UTF-8
    #[error("text stream is not valid UTF-8")]
    InvalidUtf8,

    /// An input schema could not be turned into a prototype
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}
