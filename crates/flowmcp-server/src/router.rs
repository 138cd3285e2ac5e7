//! # Method routing
//!
//! A flat dispatch table keyed by the full slash-separated method path,
//! precomputed at server build time: capability exports plus the session
//! built-ins (`initialize`, `ping`, `logging/setLevel`,
//! `completion/complete` and the `notifications/*` family).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use flowmcp_protocol::{LogLevel, PROTOCOL_VERSION};

use crate::error::ServerError;
use crate::handler::{method_handler, MethodHandler, Reply};

/// Flat dispatch table from method path to handler
#[derive(Default)]
pub struct Router {
    routes: HashMap<String, Arc<dyn MethodHandler>>,
}

impl Router {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a full method path (e.g. `tools/call`)
    pub fn insert(&mut self, path: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        self.routes.insert(path.into(), handler);
    }

    /// Look up the handler for a method path
    pub fn resolve(&self, method: &str) -> Option<Arc<dyn MethodHandler>> {
        self.routes.get(method).cloned()
    }

    /// Registered method paths, for diagnostics
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&str> = self.methods().collect();
        methods.sort_unstable();
        f.debug_struct("Router").field("methods", &methods).finish()
    }
}

/// Identity advertised in the `initialize` response
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

/// Register the session built-ins.
///
/// `capability_infos` holds the advertisement object of each non-empty
/// capability, merged into the `initialize` response.
pub(crate) fn register_builtins(
    router: &mut Router,
    identity: ServerIdentity,
    capability_infos: Vec<(String, Value)>,
) {
    router.insert("initialize", initialize(identity, capability_infos));

    router.insert(
        "ping",
        method_handler(|_ctx, _params| Box::pin(async { Ok(Reply::Result(json!({}))) })),
    );

    router.insert(
        "logging/setLevel",
        method_handler(|ctx, params| {
            Box::pin(async move {
                let level: LogLevel = params
                    .get("level")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .parse()
                    .map_err(ServerError::InvalidParams)?;

                ctx.session().set_logging_level(level);
                Ok(Reply::Result(json!({})))
            })
        }),
    );

    router.insert(
        "completion/complete",
        method_handler(|ctx, params| {
            Box::pin(async move {
                // `ref/prompt` completes through `prompts/complete`,
                // `ref/resource` through `resources/complete`, and so on.
                let ref_type = params
                    .get("ref")
                    .and_then(|r| r.get("type"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| ServerError::InvalidParams("missing ref.type".to_owned()))?;
                let kind = ref_type.strip_prefix("ref/").unwrap_or(ref_type);
                let method = format!("{kind}s/complete");

                let handler = ctx
                    .session()
                    .router()
                    .resolve(&method)
                    .ok_or_else(|| ServerError::MethodNotFound(method.clone()))?;

                handler.handle(ctx.clone(), params).await
            })
        }),
    );

    router.insert(
        "notifications/initialized",
        method_handler(|ctx, _params| {
            Box::pin(async move {
                if ctx.session().client_has_capability("roots") {
                    ctx.session().list_roots();
                }
                Ok(Reply::None)
            })
        }),
    );

    router.insert(
        "notifications/cancelled",
        method_handler(|ctx, params| {
            Box::pin(async move {
                // Recorded only; handlers are not preempted.
                tracing::debug!(
                    session = %ctx.session().id(),
                    request_id = ?params.get("requestId"),
                    reason = ?params.get("reason"),
                    "cancel notification received",
                );
                Ok(Reply::None)
            })
        }),
    );

    router.insert(
        "notifications/roots/list_changed",
        method_handler(|ctx, _params| {
            Box::pin(async move {
                ctx.session().list_roots();
                Ok(Reply::None)
            })
        }),
    );
}

fn initialize(
    identity: ServerIdentity,
    capability_infos: Vec<(String, Value)>,
) -> Arc<dyn MethodHandler> {
    method_handler(move |ctx, params| {
        let identity = identity.clone();
        let capability_infos = capability_infos.clone();

        Box::pin(async move {
            let protocol_version = params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned();
            let client_capabilities = params
                .get("capabilities")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            ctx.session().initialize(&protocol_version, client_capabilities);

            let mut capabilities = Map::new();
            for name in ["roots", "completions", "logging", "sampling"] {
                capabilities.insert(name.to_owned(), json!({}));
            }
            for (name, infos) in capability_infos {
                capabilities.insert(name, infos);
            }

            Ok(Reply::Result(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {"name": identity.name, "version": identity.version},
                "capabilities": capabilities,
            })))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_by_full_path() {
        let mut router = Router::new();
        register_builtins(
            &mut router,
            ServerIdentity {
                name: "test".into(),
                version: "0.0.0".into(),
            },
            Vec::new(),
        );

        assert!(router.resolve("ping").is_some());
        assert!(router.resolve("logging/setLevel").is_some());
        assert!(router.resolve("notifications/roots/list_changed").is_some());
        assert!(router.resolve("logging").is_none());
        assert!(router.resolve("setLevel").is_none());
    }
}
