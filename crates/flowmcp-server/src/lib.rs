//! # Flowmcp Server
//!
//! Server-side runtime for the Model Context Protocol: a host process
//! registers capabilities (tools, resources, resource templates, prompts)
//! and serves them to many concurrent MCP clients over HTTP+SSE or stdio.
//!
//! ## Architecture
//!
//! - **Capability registry** ([`capabilities`]): the three plug-ins holding
//!   tool/resource/prompt definitions, each contributing its RPC operations
//!   and its advertisement object
//! - **Router** ([`router`]): a flat dispatch table from slash-separated
//!   method paths to handlers, precomputed at build time
//! - **Session** ([`session`]): per-client outbound queue, pending-response
//!   table with bounded cleanup, logging threshold, and the sending loop
//!   that owns the SSE connection
//! - **Front-ends** (`http`, `stdio`): `GET /` opens the SSE stream,
//!   `POST /{session_id}` feeds frames in; the stdio variant serves
//!   line-delimited frames on the process pipes
//!
//! ## Example
//!
//! ```no_run
//! use flowmcp_protocol::schema::{ParamKind, Prototype, ReturnShape};
//! use flowmcp_server::{McpServer, ToolOutput};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = McpServer::builder()
//!     .name("weather")
//!     .tool(
//!         Prototype::new("get_temperature", "Get temperature as a simple float.")
//!             .required("city", ParamKind::String)
//!             .returning(ReturnShape::number()),
//!         |_ctx, _args| async move {
//!             Ok::<_, flowmcp_server::HandlerError>(ToolOutput::Json(22.5.into()))
//!         },
//!     )
//!     .build()?;
//!
//! server.serve(([127, 0, 0, 1], 9000).into()).await?;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod context;
pub mod error;
pub mod handler;
mod http;
pub mod logging;
pub mod router;
pub mod server;
pub mod session;
mod stdio;

pub use capabilities::{Prompts, Registry, Resources, Tools};
pub use context::RequestContext;
pub use error::{HandlerError, ServerError, ServerResult};
pub use handler::{
    completer, Completer, MethodHandler, PromptOutput, Reply, ResourceOutput, ResourceRequest,
    ToolOutput,
};
pub use logging::init_tracing;
pub use router::{Router, ServerIdentity};
pub use server::{McpServer, ServerBuilder, PING_TIMEOUT};
pub use session::{
    Outbound, Payload, ResponseCallback, Root, Session, CLEANUP_PERIODICITY, QUEUE_WAIT,
};
