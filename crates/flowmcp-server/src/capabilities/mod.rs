//! # Capability registries
//!
//! The three capability plug-ins: [`tools`], [`resources`] and [`prompts`].
//! Each holds its definitions, contributes an advertisement object to the
//! `initialize` response, and registers its RPC operations in the router
//! under its slash-prefixed paths.

pub mod prompts;
pub mod resources;
pub mod tools;

use std::sync::Arc;

use serde_json::Value;

use crate::router::Router;

pub use prompts::Prompts;
pub use resources::Resources;
pub use tools::Tools;

/// The capability registries of one server
#[derive(Clone)]
pub struct Registry {
    /// Registered tools
    pub tools: Arc<Tools>,
    /// Registered resources and resource templates
    pub resources: Arc<Resources>,
    /// Registered prompts
    pub prompts: Arc<Prompts>,
}

impl Registry {
    /// Register every capability operation in the dispatch table
    pub(crate) fn register_routes(&self, router: &mut Router) {
        self.tools.clone().register_routes(router);
        self.resources.clone().register_routes(router);
        self.prompts.clone().register_routes(router);
    }

    /// Advertisement objects of the non-empty capabilities, keyed by name
    pub(crate) fn capability_infos(&self) -> Vec<(String, Value)> {
        let mut infos = Vec::new();
        if !self.tools.is_empty() {
            infos.push(("tools".to_owned(), self.tools.infos()));
        }
        if !self.resources.is_empty() {
            infos.push(("resources".to_owned(), self.resources.infos()));
        }
        if !self.prompts.is_empty() {
            infos.push(("prompts".to_owned(), self.prompts.infos()));
        }

        infos
    }
}

/// Extract `argument.name` and `argument.value` from completion params
pub(crate) fn completion_argument(params: &Value) -> Option<(&str, &str)> {
    let argument = params.get("argument")?;
    Some((
        argument.get("name")?.as_str()?,
        argument.get("value").and_then(Value::as_str).unwrap_or(""),
    ))
}

/// Shape a completion reply: `{completion: {values: [...]}}`
pub(crate) fn completion_reply(values: Vec<String>) -> Value {
    serde_json::json!({"completion": {"values": values}})
}
