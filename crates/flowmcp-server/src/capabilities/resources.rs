//! # Resources capability
//!
//! URI-addressed content sources, either concrete or templated. Reads are
//! answered with the lazy streaming encoder, so a resource can hand back an
//! open file without the server ever buffering it. Template URIs use
//! `{name}` placeholders compiled to anchored regexes at registration;
//! lookups try concrete resources first, then the templates in
//! registration order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use regex::Regex;
use serde_json::{json, Value};

use flowmcp_protocol::streaming::ContentStream;

use crate::context::RequestContext;
use crate::error::{ServerError, ServerResult};
use crate::handler::{
    method_handler, Completer, Reply, ResourceHandler, ResourceOutput, ResourceRequest,
};
use crate::router::Router;

struct ResourceDef {
    handler: ResourceHandler,
    name: String,
    mime_type: Option<String>,
    description: Option<String>,
}

struct TemplateDef {
    uri_template: String,
    regex: Regex,
    handler: ResourceHandler,
    name: String,
    mime_type: Option<String>,
    description: Option<String>,
    completions: HashMap<String, Completer>,
}

/// Registry of concrete and template resources
#[derive(Default)]
pub struct Resources {
    concrete: BTreeMap<String, ResourceDef>,
    templates: Vec<TemplateDef>,
}

impl Resources {
    /// Register a concrete resource under its URI
    pub fn insert(
        &mut self,
        uri: impl Into<String>,
        name: Option<String>,
        mime_type: Option<String>,
        description: Option<String>,
        handler: ResourceHandler,
    ) {
        let uri = uri.into();
        self.concrete.insert(
            uri.clone(),
            ResourceDef {
                handler,
                name: name.unwrap_or(uri),
                mime_type,
                description,
            },
        );
    }

    /// Register a template resource; `{name}` placeholders become named
    /// captures passed to the handler
    pub fn insert_template(
        &mut self,
        uri_template: impl Into<String>,
        name: Option<String>,
        mime_type: Option<String>,
        description: Option<String>,
        completions: HashMap<String, Completer>,
        handler: ResourceHandler,
    ) -> ServerResult<()> {
        let uri_template = uri_template.into();
        let regex = compile_template(&uri_template)?;

        self.templates.push(TemplateDef {
            name: name.unwrap_or_else(|| uri_template.clone()),
            uri_template,
            regex,
            handler,
            mime_type,
            description,
            completions,
        });

        Ok(())
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.concrete.is_empty() && self.templates.is_empty()
    }

    /// Number of registered resources and templates
    pub fn len(&self) -> usize {
        self.concrete.len() + self.templates.len()
    }

    /// Advertisement object for the `initialize` response
    pub fn infos(&self) -> Value {
        json!({"subscribe": false, "listChanged": false})
    }

    fn list(&self) -> Value {
        let resources: Vec<Value> = self
            .concrete
            .iter()
            .map(|(uri, def)| {
                describe(uri, "uri", &def.name, def.mime_type.as_deref(), def.description.as_deref())
            })
            .collect();

        json!({"resources": resources})
    }

    fn templates_list(&self) -> Value {
        let templates: Vec<Value> = self
            .templates
            .iter()
            .map(|def| {
                describe(
                    &def.uri_template,
                    "uriTemplate",
                    &def.name,
                    def.mime_type.as_deref(),
                    def.description.as_deref(),
                )
            })
            .collect();

        json!({"resourceTemplates": templates})
    }

    async fn read(&self, ctx: RequestContext, params: Value) -> ServerResult<Reply> {
        let uri = params
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidParams("missing resource uri".to_owned()))?;

        if let Some(def) = self.concrete.get(uri) {
            let request = ResourceRequest {
                uri: uri.to_owned(),
                name: def.name.clone(),
                params: HashMap::new(),
            };
            return invoke(&def.handler, def.mime_type.as_deref(), ctx, request).await;
        }

        // First matching template wins, in registration order.
        for def in &self.templates {
            if let Some(captures) = def.regex.captures(uri) {
                let params: HashMap<String, String> = def
                    .regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|capture| (name.to_owned(), capture.as_str().to_owned()))
                    })
                    .collect();

                let request = ResourceRequest {
                    uri: uri.to_owned(),
                    name: def.name.clone(),
                    params,
                };
                return invoke(&def.handler, def.mime_type.as_deref(), ctx, request).await;
            }
        }

        Err(ServerError::InvalidParams(format!("unknown resource `{uri}`")))
    }

    fn complete(&self, params: &Value) -> ServerResult<Reply> {
        let uri = params
            .get("ref")
            .and_then(|r| r.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidParams("missing ref.uri".to_owned()))?;
        let def = self
            .templates
            .iter()
            .find(|def| def.uri_template == uri)
            .ok_or_else(|| {
                ServerError::InvalidParams(format!("unknown resource template `{uri}`"))
            })?;

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
        let resources = self.clone();
        router.insert(
            "resources/list",
            method_handler(move |_ctx, _params| {
                let resources = resources.clone();
                Box::pin(async move { Ok(Reply::Result(resources.list())) })
            }),
        );

        let resources = self.clone();
        router.insert(
            "resources/templates/list",
            method_handler(move |_ctx, _params| {
                let resources = resources.clone();
                Box::pin(async move { Ok(Reply::Result(resources.templates_list())) })
            }),
        );

        let resources = self.clone();
        router.insert(
            "resources/read",
            method_handler(move |ctx, params| {
                let resources = resources.clone();
                Box::pin(async move { resources.read(ctx, params).await })
            }),
        );

        let resources = self;
        router.insert(
            "resources/complete",
            method_handler(move |_ctx, params| {
                let resources = resources.clone();
                Box::pin(async move { resources.complete(&params) })
            }),
        );
    }
}

async fn invoke(
    handler: &ResourceHandler,
    mime_type: Option<&str>,
    ctx: RequestContext,
    request: ResourceRequest,
) -> ServerResult<Reply> {
    let uri = request.uri.clone();

    match handler(ctx, request).await {
        Ok(output) => {
            let mut streams = Vec::new();
            into_streams(&uri, mime_type, output, &mut streams);
            Ok(Reply::Stream(streams))
        }
        Err(error) => {
            tracing::error!(%uri, %error, "resource handler failed");
            Err(ServerError::Internal(error.to_string()))
        }
    }
}

/// Coerce a handler return value into `(uri, mime_type, stream)` triples.
///
/// The registered mime type wins; without one, text contents default to
/// `text/plain` and binary contents to `application/octet-stream`.
fn into_streams(
    uri: &str,
    mime_type: Option<&str>,
    output: ResourceOutput,
    streams: &mut Vec<ContentStream>,
) {
    match output {
        ResourceOutput::Text(text) => streams.push(ContentStream::from_text(
            uri,
            mime_type.unwrap_or("text/plain"),
            text,
        )),
        ResourceOutput::Bytes(data) => streams.push(ContentStream::from_bytes(
            uri,
            mime_type.unwrap_or("application/octet-stream"),
            data,
        )),
        ResourceOutput::Reader(reader) => streams.push(ContentStream::from_reader(
            uri,
            mime_type.unwrap_or("application/octet-stream"),
            reader,
        )),
        ResourceOutput::Many(outputs) => {
            for output in outputs {
                into_streams(uri, mime_type, output, streams);
            }
        }
    }
}

fn describe(
    uri: &str,
    uri_key: &str,
    name: &str,
    mime_type: Option<&str>,
    description: Option<&str>,
) -> Value {
    let mut resource = json!({uri_key: uri, "name": name});
    if let Some(mime_type) = mime_type {
        resource["mimeType"] = json!(mime_type);
    }
    if let Some(description) = description {
        resource["description"] = json!(description);
    }

    resource
}

/// Compile a `{name}` URI template into an anchored regex with one named
/// capture per placeholder
fn compile_template(template: &str) -> ServerResult<Regex> {
    let mut pattern = String::from("^");
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '{' {
            pattern.push_str(&regex::escape(&c.to_string()));
            continue;
        }

        let mut name = String::new();
        for c in chars.by_ref() {
            if c == '}' {
                break;
            }
            name.push(c);
        }
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ServerError::Configuration(format!(
                "invalid placeholder in uri template `{template}`"
            )));
        }
        pattern.push_str(&format!("(?P<{name}>.+?)"));
    }
    pattern.push('$');

    Regex::new(&pattern).map_err(|error| {
        ServerError::Configuration(format!("uri template `{template}` does not compile: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn template_compiles_to_named_captures() {
        let regex = compile_template("file:///logs/{day}/{level}.log").unwrap();

        let captures = regex.captures("file:///logs/2024-06-01/error.log").unwrap();
        assert_eq!(&captures["day"], "2024-06-01");
        assert_eq!(&captures["level"], "error");

        assert!(regex.captures("file:///logs/2024-06-01").is_none());
        assert!(regex.captures("prefix file:///logs/a/b.log").is_none());
    }

    #[test]
    fn template_escapes_literal_metacharacters() {
        let regex = compile_template("db://table.rows/{id}").unwrap();
        assert!(regex.captures("db://tableXrows/42").is_none());
        assert_eq!(&regex.captures("db://table.rows/42").unwrap()["id"], "42");
    }

    #[test]
    fn invalid_placeholder_is_a_configuration_error() {
        assert!(compile_template("res://{}").is_err());
        assert!(compile_template("res://{bad name}").is_err());
    }

    #[test]
    fn listing_separates_concrete_and_templates() {
        let mut resources = Resources::default();
        let handler = crate::handler::resource_handler(|_ctx, _req| async {
            Ok::<_, crate::error::HandlerError>(ResourceOutput::Text("1.0".to_owned()))
        });
        resources.insert(
            "res://version",
            Some("version".to_owned()),
            Some("text/plain".to_owned()),
            None,
            handler.clone(),
        );
        resources
            .insert_template(
                "res://logs/{day}",
                None,
                None,
                Some("daily logs".to_owned()),
                HashMap::new(),
                handler,
            )
            .unwrap();

        assert_eq!(
            resources.list(),
            json!({"resources": [
                {"uri": "res://version", "name": "version", "mimeType": "text/plain"},
            ]})
        );
        assert_eq!(
            resources.templates_list(),
            json!({"resourceTemplates": [
                {"uriTemplate": "res://logs/{day}", "name": "res://logs/{day}", "description": "daily logs"},
            ]})
        );
    }
}
