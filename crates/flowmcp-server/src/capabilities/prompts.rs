//! # Prompts capability
//!
//! Parameterized message templates. The `get` operation returns role/content
//! messages; handlers returning a primitive get it wrapped as a single user
//! text message.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{json, Value};

use flowmcp_protocol::content::{PromptMessage, Role};
use flowmcp_protocol::schema::Prototype;

use crate::context::RequestContext;
use crate::error::{ServerError, ServerResult};
use crate::handler::{method_handler, Completer, PromptHandler, PromptOutput, Reply};
use crate::router::Router;

struct PromptDef {
    proto: Prototype,
    handler: PromptHandler,
    completions: HashMap<String, Completer>,
}

/// Registry of prompt templates
#[derive(Default)]
pub struct Prompts {
    prompts: BTreeMap<String, PromptDef>,
}

impl Prompts {
    /// Register a prompt under its prototype name
    pub fn insert(
        &mut self,
        proto: Prototype,
        handler: PromptHandler,
        completions: HashMap<String, Completer>,
    ) {
        self.prompts.insert(
            proto.name.clone(),
            PromptDef {
                proto,
                handler,
                completions,
            },
        );
    }

    /// Whether no prompt is registered
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Number of registered prompts
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Advertisement object for the `initialize` response
    pub fn infos(&self) -> Value {
        json!({"listChanged": false})
    }

    fn list(&self) -> Value {
        let prompts: Vec<Value> = self
            .prompts
            .values()
            .map(|def| {
                let arguments: Vec<Value> = def
                    .proto
                    .params
                    .iter()
                    .map(|param| json!({"name": param.name, "required": param.required}))
                    .collect();

                json!({
                    "name": def.proto.name,
                    "description": def.proto.description,
                    "arguments": arguments,
                })
            })
            .collect();

        json!({"prompts": prompts})
    }

    async fn get(&self, ctx: RequestContext, params: Value) -> ServerResult<Reply> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidParams("missing prompt name".to_owned()))?;
        let arguments = params
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let def = self
            .prompts
            .get(name)
            .ok_or_else(|| ServerError::InvalidParams(format!("unknown prompt `{name}`")))?;
        def.proto
            .validate(&arguments)
            .map_err(ServerError::InvalidParams)?;

        tracing::debug!(prompt = %name, "rendering prompt");

        match (def.handler)(ctx, arguments).await {
            Ok(output) => Ok(Reply::Result(json!({"messages": messages(output)}))),
            Err(error) => {
                tracing::error!(prompt = %name, %error, "prompt handler failed");
                Err(ServerError::Internal(error.to_string()))
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
            .prompts
            .get(name)
            .ok_or_else(|| ServerError::InvalidParams(format!("unknown prompt `{name}`")))?;

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
        let prompts = self.clone();
        router.insert(
            "prompts/list",
            method_handler(move |_ctx, _params| {
                let prompts = prompts.clone();
                Box::pin(async move { Ok(Reply::Result(prompts.list())) })
            }),
        );

        let prompts = self.clone();
        router.insert(
            "prompts/get",
            method_handler(move |ctx, params| {
                let prompts = prompts.clone();
                Box::pin(async move { prompts.get(ctx, params).await })
            }),
        );

        let prompts = self;
        router.insert(
            "prompts/complete",
            method_handler(move |_ctx, params| {
                let prompts = prompts.clone();
                Box::pin(async move { prompts.complete(&params) })
            }),
        );
    }
}

/// Normalize a prompt return value into role/content messages
fn messages(output: PromptOutput) -> Vec<PromptMessage> {
    match output {
        PromptOutput::Messages(messages) => messages,
        PromptOutput::Content(blocks) => blocks
            .into_iter()
            .map(|content| PromptMessage {
                role: Role::User,
                content,
            })
            .collect(),
        PromptOutput::Json(Value::String(text)) => vec![PromptMessage::user_text(text)],
        PromptOutput::Json(value) => vec![PromptMessage::user_text(value.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmcp_protocol::content::Content;
    use pretty_assertions::assert_eq;

    #[test]
    fn primitive_output_becomes_a_user_text_message() {
        let rendered = messages(PromptOutput::Json(json!("review this code")));
        assert_eq!(
            serde_json::to_value(rendered).unwrap(),
            json!([{"role": "user", "content": {"type": "text", "text": "review this code"}}])
        );

        let rendered = messages(PromptOutput::Json(json!(42)));
        assert_eq!(
            serde_json::to_value(rendered).unwrap(),
            json!([{"role": "user", "content": {"type": "text", "text": "42"}}])
        );
    }

    #[test]
    fn content_output_keeps_each_item() {
        let rendered = messages(PromptOutput::Content(vec![
            Content::text("first"),
            Content::image(b"abc", "image/png"),
        ]));
        assert_eq!(rendered.len(), 2);
        assert!(matches!(rendered[1].content, Content::Image(_)));
    }

    #[test]
    fn explicit_messages_pass_through() {
        let rendered = messages(PromptOutput::Messages(vec![PromptMessage {
            role: Role::Assistant,
            content: Content::text("done"),
        }]));
        assert_eq!(
            serde_json::to_value(rendered).unwrap(),
            json!([{"role": "assistant", "content": {"type": "text", "text": "done"}}])
        );
    }
}
