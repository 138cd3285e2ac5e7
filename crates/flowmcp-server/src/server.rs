//! # Server construction and lifecycle
//!
//! [`ServerBuilder`] collects capability registrations and produces an
//! [`McpServer`]: the immutable registry, the precomputed dispatch table,
//! and the live session map. The server is shared behind an `Arc` by the
//! HTTP and stdio front-ends.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use flowmcp_protocol::schema::Prototype;
use flowmcp_protocol::streaming::CHUNK_SIZE;

use crate::capabilities::{Prompts, Registry, Resources, Tools};
use crate::error::{HandlerError, ServerError, ServerResult};
use crate::handler::{
    prompt_handler, resource_handler, tool_handler, Completer, PromptOutput, ResourceOutput,
    ResourceRequest, ToolOutput,
};
use crate::context::RequestContext;
use crate::router::{register_builtins, Router, ServerIdentity};
use crate::session::Session;

/// Default ping timeout for idle sessions
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// A built MCP server: registry, dispatch table, and live sessions
pub struct McpServer {
    identity: ServerIdentity,
    ping_timeout: Duration,
    chunk_size: usize,
    router: Arc<Router>,
    registry: Registry,
    sessions: DashMap<String, Arc<Session>>,
}

impl McpServer {
    /// Start building a server
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Name and version advertised in the `initialize` response
    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Capability registries
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Idle interval after which sessions emit a ping
    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    /// Create and register a session
    pub fn create_session(&self, id: impl Into<String>) -> Arc<Session> {
        let id = id.into();
        let session = Session::new(id.clone(), self.router.clone(), self.chunk_size);
        self.sessions.insert(id, session.clone());

        session
    }

    /// Look up a live session
    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Drop a session from the map (its sending loop exited)
    pub fn remove_session(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The axum application serving `GET /` and `POST /{session_id}`
    pub fn into_app(self: Arc<Self>) -> axum::Router {
        crate::http::app(self)
    }

    /// Serve MCP over HTTP/SSE on `addr` until the listener fails
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> ServerResult<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, server = %self.identity.name, "serving MCP over HTTP/SSE");
        axum::serve(listener, self.into_app()).await?;

        Ok(())
    }

    /// Serve MCP over stdin/stdout with the process-lived `stdio` session
    pub async fn run_stdio(self: Arc<Self>) -> ServerResult<()> {
        crate::stdio::run(self).await
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("name", &self.identity.name)
            .field("version", &self.identity.version)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

/// Builder collecting capability registrations
pub struct ServerBuilder {
    name: String,
    version: String,
    ping_timeout: Duration,
    chunk_size: usize,
    tools: Tools,
    resources: Resources,
    prompts: Prompts,
    error: Option<ServerError>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    /// Builder with the default name, ping timeout and chunk size
    pub fn new() -> Self {
        Self {
            name: "Flowmcp Server".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            ping_timeout: PING_TIMEOUT,
            chunk_size: CHUNK_SIZE,
            tools: Tools::default(),
            resources: Resources::default(),
            prompts: Prompts::default(),
            error: None,
        }
    }

    /// Advertised server name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Advertised server version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Idle interval after which sessions emit a ping
    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Streaming chunk size; must stay a multiple of 3
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size == 0 || chunk_size % 3 != 0 {
            self.record_error(ServerError::Configuration(format!(
                "chunk size {chunk_size} is not a multiple of 3"
            )));
        } else {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Register a tool
    pub fn tool<F, Fut, O>(self, proto: Prototype, f: F) -> Self
    where
        F: Fn(RequestContext, serde_json::Map<String, serde_json::Value>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
        O: Into<ToolOutput>,
    {
        self.tool_with_completions(proto, HashMap::new(), f)
    }

    /// Register a tool with per-argument completions
    pub fn tool_with_completions<F, Fut, O>(
        mut self,
        proto: Prototype,
        completions: HashMap<String, Completer>,
        f: F,
    ) -> Self
    where
        F: Fn(RequestContext, serde_json::Map<String, serde_json::Value>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
        O: Into<ToolOutput>,
    {
        self.tools.insert(proto, tool_handler(f), completions);
        self
    }

    /// Register a concrete resource
    pub fn resource<F, Fut, O>(
        mut self,
        uri: impl Into<String>,
        name: Option<String>,
        mime_type: Option<String>,
        description: Option<String>,
        f: F,
    ) -> Self
    where
        F: Fn(RequestContext, ResourceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
        O: Into<ResourceOutput>,
    {
        self.resources
            .insert(uri, name, mime_type, description, resource_handler(f));
        self
    }

    /// Register a template resource; `{name}` placeholders reach the
    /// handler as named parameters
    pub fn template<F, Fut, O>(
        mut self,
        uri_template: impl Into<String>,
        name: Option<String>,
        mime_type: Option<String>,
        description: Option<String>,
        completions: HashMap<String, Completer>,
        f: F,
    ) -> Self
    where
        F: Fn(RequestContext, ResourceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
        O: Into<ResourceOutput>,
    {
        if let Err(error) = self.resources.insert_template(
            uri_template,
            name,
            mime_type,
            description,
            completions,
            resource_handler(f),
        ) {
            self.record_error(error);
        }
        self
    }

    /// Register a prompt
    pub fn prompt<F, Fut, O>(self, proto: Prototype, f: F) -> Self
    where
        F: Fn(RequestContext, serde_json::Map<String, serde_json::Value>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
        O: Into<PromptOutput>,
    {
        self.prompt_with_completions(proto, HashMap::new(), f)
    }

    /// Register a prompt with per-argument completions
    pub fn prompt_with_completions<F, Fut, O>(
        mut self,
        proto: Prototype,
        completions: HashMap<String, Completer>,
        f: F,
    ) -> Self
    where
        F: Fn(RequestContext, serde_json::Map<String, serde_json::Value>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
        O: Into<PromptOutput>,
    {
        self.prompts.insert(proto, prompt_handler(f), completions);
        self
    }

    fn record_error(&mut self, error: ServerError) {
        // First registration error wins; build() reports it.
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Freeze the registry and precompute the dispatch table.
    ///
    /// # Errors
    ///
    /// Reports the first registration error (invalid chunk size, malformed
    /// URI template).
    pub fn build(self) -> ServerResult<Arc<McpServer>> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let identity = ServerIdentity {
            name: self.name,
            version: self.version,
        };
        let registry = Registry {
            tools: Arc::new(self.tools),
            resources: Arc::new(self.resources),
            prompts: Arc::new(self.prompts),
        };

        let mut router = Router::new();
        registry.register_routes(&mut router);
        register_builtins(&mut router, identity.clone(), registry.capability_infos());

        Ok(Arc::new(McpServer {
            identity,
            ping_timeout: self.ping_timeout,
            chunk_size: self.chunk_size,
            router: Arc::new(router),
            registry,
            sessions: DashMap::new(),
        }))
    }
}
