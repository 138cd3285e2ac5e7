//! # Tools capability
//!
//! Named callables advertised with a JSON-Schema for their inputs and,
//! optionally, a structured output schema. Handler failures surface as
//! tool-level errors inside a successful RPC response so the model can
//! observe them; only argument validation failures become protocol errors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{json, Value};

use flowmcp_protocol::content::Content;
use flowmcp_protocol::schema::{Prototype, ReturnShape};

use crate::context::RequestContext;
use crate::error::{ServerError, ServerResult};
use crate::handler::{method_handler, Completer, Reply, ToolHandler, ToolOutput};
use crate::router::Router;

struct ToolDef {
    proto: Prototype,
    handler: ToolHandler,
    completions: HashMap<String, Completer>,
}

/// Registry of callable tools
#[derive(Default)]
pub struct Tools {
    tools: BTreeMap<String, ToolDef>,
}

impl Tools {
    /// Register a tool under its prototype name
    pub fn insert(
        &mut self,
        proto: Prototype,
        handler: ToolHandler,
        completions: HashMap<String, Completer>,
    ) {
        self.tools.insert(
            proto.name.clone(),
            ToolDef {
                proto,
                handler,
                completions,
            },
        );
    }

    /// Whether no tool is registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Advertisement object for the `initialize` response
    pub fn infos(&self) -> Value {
        json!({"listChanged": false})
    }

    fn list(&self) -> Value {
        // BTreeMap iteration gives the name-sorted order the listing
        // promises.
        let tools: Vec<Value> = self.tools.values().map(|def| def.proto.describe()).collect();
        json!({"tools": tools})
    }

    async fn call(&self, ctx: RequestContext, params: Value) -> ServerResult<Reply> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidParams("missing tool name".to_owned()))?;
        let arguments = params
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let def = self
            .tools
            .get(name)
            .ok_or_else(|| ServerError::InvalidParams(format!("unknown tool `{name}`")))?;
        def.proto
            .validate(&arguments)
            .map_err(ServerError::InvalidParams)?;

        tracing::debug!(tool = %name, "calling tool");

        match (def.handler)(ctx, arguments).await {
            Ok(output) => Ok(Reply::Result(tool_response(
                def.proto.returns.as_ref(),
                output,
            ))),
            Err(error) => {
                // Tool-level failure: a successful RPC response carrying
                // isError so the model can observe it.
                tracing::warn!(tool = %name, %error, "tool failed");
                Ok(Reply::Result(json!({
                    "isError": true,
                    "content": [Content::text(error.to_string())],
                })))
            }
        }
    }

    fn complete(&self, params: &Value) -> ServerResult<Reply> {
        let name = params
            .get("ref")
            .and_then(|r| r.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidParams("missing ref.name".to_owned()))?;
        let def = self
            .tools
            .get(name)
            .ok_or_else(|| ServerError::InvalidParams(format!("unknown tool `{name}`")))?;

        let (argument, value) = super::completion_argument(params)
            .ok_or_else(|| ServerError::InvalidParams("missing argument".to_owned()))?;
        let values = def
            .completions
            .get(argument)
            .map(|complete| complete(value))
            .unwrap_or_default();

        Ok(Reply::Result(super::completion_reply(values)))
    }

    pub(crate) fn register_routes(self: Arc<Self>, router: &mut Router) {
        let tools = self.clone();
        router.insert(
            "tools/list",
            method_handler(move |_ctx, _params| {
                let tools = tools.clone();
                Box::pin(async move { Ok(Reply::Result(tools.list())) })
            }),
        );

        let tools = self.clone();
        router.insert(
            "tools/call",
            method_handler(move |ctx, params| {
                let tools = tools.clone();
                Box::pin(async move { tools.call(ctx, params).await })
            }),
        );

        let tools = self;
        router.insert(
            "tools/complete",
            method_handler(move |_ctx, params| {
                let tools = tools.clone();
                Box::pin(async move { tools.complete(&params) })
            }),
        );
    }
}

/// Normalize a tool return value into the `tools/call` response payload.
///
/// `structuredContent` is emitted only when the tool declares a return
/// shape and the handler produced a JSON value.
pub(crate) fn tool_response(returns: Option<&ReturnShape>, output: ToolOutput) -> Value {
    let (content, raw) = normalize(output);

    let mut response = json!({"isError": false, "content": content});
    if let (Some(shape), Some(raw)) = (returns, raw) {
        response["structuredContent"] = shape.wrap_structured(raw);
    }

    response
}

/// Split a tool output into content items and the raw JSON value feeding
/// `structuredContent`
fn normalize(output: ToolOutput) -> (Vec<Content>, Option<Value>) {
    match output {
        ToolOutput::None | ToolOutput::Json(Value::Null) => (Vec::new(), None),
        ToolOutput::Json(Value::Array(items)) => {
            let content = items.iter().map(value_to_text).collect();
            (content, Some(Value::Array(items)))
        }
        ToolOutput::Json(value) => (vec![value_to_text(&value)], Some(value)),
        ToolOutput::Content(blocks) => (blocks, None),
    }
}

/// A value as displayable text: strings stay bare, everything else is
/// compact JSON
fn value_to_text(value: &Value) -> Content {
    match value {
        Value::String(text) => Content::text(text.clone()),
        other => Content::text(other.to_string()),
    }
}
