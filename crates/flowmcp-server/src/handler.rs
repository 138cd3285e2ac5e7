//! # Method handlers and handler return types
//!
//! Every RPC method resolves to a [`MethodHandler`]; capability operations
//! and session built-ins all go through the same trait. Registered user
//! handlers (tools, resources, prompts) are plain async closures adapted
//! into the boxed types below at registration time.

use std::collections::HashMap;
use std::future::Future;
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

use flowmcp_protocol::content::{Content, PromptMessage};
use flowmcp_protocol::streaming::ContentStream;

use crate::context::RequestContext;
use crate::error::{HandlerError, ServerResult};

/// What a resolved method produces
pub enum Reply {
    /// JSON `result` payload
    Result(Value),
    /// Lazy `resources/read` payload, encoded with the session's chunk size
    Stream(Vec<ContentStream>),
    /// Nothing (notification handlers)
    None,
}

/// A dispatchable RPC method
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Handle the request and produce a reply
    async fn handle(&self, ctx: RequestContext, params: Value) -> ServerResult<Reply>;
}

/// Adapt an async closure into a boxed [`MethodHandler`]
pub(crate) fn method_handler<F>(f: F) -> Arc<dyn MethodHandler>
where
    F: Fn(RequestContext, Value) -> BoxFuture<'static, ServerResult<Reply>> + Send + Sync + 'static,
{
    struct FnHandler<F>(F);

    #[async_trait]
    impl<F> MethodHandler for FnHandler<F>
    where
        F: Fn(RequestContext, Value) -> BoxFuture<'static, ServerResult<Reply>>
            + Send
            + Sync
            + 'static,
    {
        async fn handle(&self, ctx: RequestContext, params: Value) -> ServerResult<Reply> {
            (self.0)(ctx, params).await
        }
    }

    Arc::new(FnHandler(f))
}

/// Return value of a tool handler, before normalization
pub enum ToolOutput {
    /// No content at all
    None,
    /// A JSON value: primitive, array, record or mapping.
    ///
    /// Arrays become one text item per element; objects are serialized
    /// compactly; everything feeds `structuredContent` when the tool
    /// declares a return shape.
    Json(Value),
    /// Pre-built content items, emitted verbatim (no structured content)
    Content(Vec<Content>),
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

impl From<Content> for ToolOutput {
    fn from(content: Content) -> Self {
        ToolOutput::Content(vec![content])
    }
}

/// Return value of a prompt handler, before normalization
pub enum PromptOutput {
    /// Complete role/content messages, emitted verbatim
    Messages(Vec<PromptMessage>),
    /// Content items, each wrapped as a user message
    Content(Vec<Content>),
    /// A primitive, wrapped as one user text message
    Json(Value),
}

impl From<Value> for PromptOutput {
    fn from(value: Value) -> Self {
        PromptOutput::Json(value)
    }
}

impl From<PromptMessage> for PromptOutput {
    fn from(message: PromptMessage) -> Self {
        PromptOutput::Messages(vec![message])
    }
}

/// Return value of a resource handler: string, bytes, an open reader, or
/// several of them
pub enum ResourceOutput {
    /// Text contents
    Text(String),
    /// Binary contents
    Bytes(Vec<u8>),
    /// Streamed contents; the reader is drained by the encoder and
    /// released when the response finishes or fails
    Reader(Box<dyn Read + Send>),
    /// Multiple contents for the same URI
    Many(Vec<ResourceOutput>),
}

impl From<String> for ResourceOutput {
    fn from(text: String) -> Self {
        ResourceOutput::Text(text)
    }
}

impl From<&str> for ResourceOutput {
    fn from(text: &str) -> Self {
        ResourceOutput::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for ResourceOutput {
    fn from(data: Vec<u8>) -> Self {
        ResourceOutput::Bytes(data)
    }
}

/// A concrete or template resource invocation
pub struct ResourceRequest {
    /// Requested URI
    pub uri: String,
    /// Registered resource name
    pub name: String,
    /// Named captures from the URI template, empty for concrete resources
    pub params: HashMap<String, String>,
}

/// Boxed tool handler
pub type ToolHandler = Arc<
    dyn Fn(RequestContext, Map<String, Value>) -> BoxFuture<'static, Result<ToolOutput, HandlerError>>
        + Send
        + Sync,
>;

/// Boxed resource handler
pub type ResourceHandler = Arc<
    dyn Fn(RequestContext, ResourceRequest) -> BoxFuture<'static, Result<ResourceOutput, HandlerError>>
        + Send
        + Sync,
>;

/// Boxed prompt handler
pub type PromptHandler = Arc<
    dyn Fn(RequestContext, Map<String, Value>) -> BoxFuture<'static, Result<PromptOutput, HandlerError>>
        + Send
        + Sync,
>;

/// Per-argument completion closure
pub type Completer = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Box an async closure as a [`ToolHandler`]
pub fn tool_handler<F, Fut, O>(f: F) -> ToolHandler
where
    F: Fn(RequestContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
    O: Into<ToolOutput>,
{
    Arc::new(move |ctx, args| {
        let fut = f(ctx, args);
        Box::pin(async move { fut.await.map(Into::into) })
            as BoxFuture<'static, Result<ToolOutput, HandlerError>>
    })
}

/// Box an async closure as a [`ResourceHandler`]
pub fn resource_handler<F, Fut, O>(f: F) -> ResourceHandler
where
    F: Fn(RequestContext, ResourceRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
    O: Into<ResourceOutput>,
{
    Arc::new(move |ctx, request| {
        let fut = f(ctx, request);
        Box::pin(async move { fut.await.map(Into::into) })
            as BoxFuture<'static, Result<ResourceOutput, HandlerError>>
    })
}

/// Box an async closure as a [`PromptHandler`]
pub fn prompt_handler<F, Fut, O>(f: F) -> PromptHandler
where
    F: Fn(RequestContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
    O: Into<PromptOutput>,
{
    Arc::new(move |ctx, args| {
        let fut = f(ctx, args);
        Box::pin(async move { fut.await.map(Into::into) })
            as BoxFuture<'static, Result<PromptOutput, HandlerError>>
    })
}

/// Box a completion closure as a [`Completer`]
pub fn completer<F>(f: F) -> Completer
where
    F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
{
    Arc::new(f)
}
