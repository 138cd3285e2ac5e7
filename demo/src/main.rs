//! Demo capability server: a couple of tools, a streamed resource, a
//! templated resource with completion, and a prompt.
//!
//! Serves HTTP/SSE on 127.0.0.1:9000 by default; pass `--stdio` to speak
//! line-delimited JSON-RPC on the process pipes instead (logs go to
//! stderr either way).

use std::collections::HashMap;

use serde_json::json;

use flowmcp_protocol::schema::{ParamKind, Prototype, ReturnShape};
use flowmcp_server::{
    completer, HandlerError, McpServer, PromptOutput, ResourceOutput, ToolOutput,
};

const CITIES: [&str; 4] = ["London", "Paris", "Tokyo", "Lisbon"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    flowmcp_server::init_tracing("info")?;

    let server = McpServer::builder()
        .name("flowmcp-demo")
        .version(env!("CARGO_PKG_VERSION"))
        .tool(
            Prototype::new("get_temperature", "Get temperature as a simple float.")
                .required("city", ParamKind::String)
                .returning(ReturnShape::number()),
            |ctx, args| async move {
                let city = args["city"].as_str().unwrap_or_default().to_owned();
                ctx.progress(1.0, Some(1.0), Some("looked up"));
                tracing::info!(%city, "temperature requested");
                Ok::<_, HandlerError>(ToolOutput::Json(json!(22.5)))
            },
        )
        .tool(
            Prototype::new("list_cities", "Get a list of cities.")
                .returning(ReturnShape::array(json!({"type": "string"}))),
            |_ctx, _args| async move { Ok::<_, HandlerError>(ToolOutput::Json(json!(CITIES))) },
        )
        .resource(
            "res://readme",
            Some("readme".to_owned()),
            Some("text/plain".to_owned()),
            Some("what this demo exposes".to_owned()),
            |_ctx, _req| async move {
                Ok::<_, HandlerError>(ResourceOutput::Text(
                    "flowmcp demo server: two tools, two resources, one prompt\n".to_owned(),
                ))
            },
        )
        .template(
            "res://cities/{city}/weather",
            Some("city weather".to_owned()),
            Some("text/plain".to_owned()),
            Some("current weather for a city".to_owned()),
            HashMap::from([(
                "city".to_owned(),
                completer(|prefix: &str| {
                    CITIES
                        .iter()
                        .filter(|city| city.to_lowercase().starts_with(&prefix.to_lowercase()))
                        .map(ToString::to_string)
                        .collect()
                }),
            )]),
            |_ctx, req| async move {
                Ok::<_, HandlerError>(ResourceOutput::Text(format!(
                    "sunny in {}, 22.5 C\n",
                    req.params["city"]
                )))
            },
        )
        .prompt(
            Prototype::new("city_guide", "Ask for a travel guide.")
                .required("city", ParamKind::String),
            |_ctx, args| async move {
                Ok::<_, HandlerError>(PromptOutput::Json(json!(format!(
                    "Write a short travel guide for {}.",
                    args["city"].as_str().unwrap_or_default()
                ))))
            },
        )
        .build()?;

    if std::env::args().any(|arg| arg == "--stdio") {
        server.run_stdio().await?;
    } else {
        server.serve(([127, 0, 0, 1], 9000).into()).await?;
    }

    Ok(())
}
