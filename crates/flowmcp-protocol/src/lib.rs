//! # Flowmcp Protocol
//!
//! Protocol layer for the flowmcp server runtime: everything needed to speak
//! Model Context Protocol (JSON-RPC 2.0 over HTTP+SSE or stdio) without any
//! transport or capability logic.
//!
//! ## What's Inside
//!
//! - **JSON-RPC**: frame types, the standard error code table, compact byte
//!   encoding, and incoming-frame classification ([`jsonrpc`])
//! - **Content**: tool/prompt result variants and sampling message builders
//!   serialized to the MCP wire shapes ([`content`])
//! - **Logging levels**: the eight ordered MCP severities ([`levels`])
//! - **Prototype/schema bridge**: declarative handler signatures, JSON-Schema
//!   emission in both directions, argument validation and CLI coercion
//!   ([`schema`])
//! - **Streaming encoder**: a lazy iterator producing a syntactically valid
//!   `resources/read` response from arbitrarily many binary or text streams,
//!   never materializing the payload ([`streaming`])
//!
//! The protocol version advertised by servers built on this crate is
//! [`PROTOCOL_VERSION`] (`2024-11-05`).

pub mod content;
pub mod error;
pub mod jsonrpc;
pub mod levels;
pub mod schema;
pub mod streaming;

pub use content::{
    Content, EmbeddedResource, ImageContent, ModelPreferences, PromptMessage, ResourceContents,
    Role, SamplingMessage, TextContent,
};
pub use error::ProtocolError;
pub use jsonrpc::{
    Frame, JsonRpcError, JsonRpcErrorCode, JsonRpcNotification, JsonRpcRequest, JsonRpcVersion,
    RequestId, JSONRPC_VERSION,
};
pub use levels::LogLevel;
pub use schema::{Param, ParamKind, Prototype, ReturnShape};
pub use streaming::{ContentStream, StreamingResponse, CHUNK_SIZE};

/// MCP protocol revision advertised in the `initialize` response.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
