//! End-to-end dispatch tests driven through `Session::handle_json_rpc`,
//! without sockets: every scenario feeds raw frames and inspects the reply
//! payloads a client would receive over SSE.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use flowmcp_protocol::schema::{ParamKind, Prototype, RecordShape, ReturnShape};
use flowmcp_server::{
    completer, McpServer, Payload, PromptOutput, ResourceOutput, ToolOutput,
};

fn demo_server() -> Arc<McpServer> {
    let report: Vec<u8> = (0..5000u32).map(|i| (i % 249) as u8).collect();

    McpServer::builder()
        .name("demo-server")
        .version("1.2.3")
        .chunk_size(30)
        .tool(
            Prototype::new("get_temperature", "Get temperature as a simple float.")
                .required("city", ParamKind::String)
                .returning(ReturnShape::number()),
            |_ctx, _args| async move { Ok::<_, flowmcp_server::HandlerError>(ToolOutput::Json(json!(22.5))) },
        )
        .tool(
            Prototype::new("list_cities", "Get a list of cities.")
                .returning(ReturnShape::array(json!({"type": "string"}))),
            |_ctx, _args| async move {
                Ok::<_, flowmcp_server::HandlerError>(ToolOutput::Json(json!(["London", "Paris", "Tokyo"])))
            },
        )
        .tool(
            Prototype::new("get_user", "Get user profile.")
                .required("user_id", ParamKind::String)
                .returning(
                    RecordShape::new("UserProfile")
                        .field("name", json!({"type": "string"}), true)
                        .field("age", json!({"type": "integer"}), true)
                        .build(),
                ),
            |_ctx, _args| async move {
                Ok::<_, flowmcp_server::HandlerError>(ToolOutput::Json(json!({"name": "Alice", "age": 30})))
            },
        )
        .tool(
            Prototype::new("explode", "Always fails."),
            |_ctx, _args| async move { Err::<ToolOutput, _>("boom".into()) },
        )
        .resource(
            "res://report",
            Some("report".to_owned()),
            Some("application/pdf".to_owned()),
            Some("the yearly report".to_owned()),
            move |_ctx, _req| {
                let report = report.clone();
                async move { Ok::<_, flowmcp_server::HandlerError>(ResourceOutput::Bytes(report)) }
            },
        )
        .resource(
            "res://motd",
            None,
            Some("text/plain".to_owned()),
            None,
            |_ctx, _req| async move {
                Ok::<_, flowmcp_server::HandlerError>(ResourceOutput::Text("hello, world".to_owned()))
            },
        )
        .resource(
            "res://flaky",
            None,
            Some("text/plain".to_owned()),
            None,
            |_ctx, _req| async move { Err::<ResourceOutput, _>("disk on fire".into()) },
        )
        .template(
            "res://cities/{city}/weather",
            Some("city weather".to_owned()),
            Some("text/plain".to_owned()),
            None,
            HashMap::from([(
                "city".to_owned(),
                completer(|prefix: &str| {
                    ["London", "Lisbon", "Paris"]
                        .iter()
                        .filter(|city| city.to_lowercase().starts_with(&prefix.to_lowercase()))
                        .map(ToString::to_string)
                        .collect()
                }),
            )]),
            |_ctx, req| async move {
                Ok::<_, flowmcp_server::HandlerError>(ResourceOutput::Text(format!(
                    "weather in {}",
                    req.params["city"]
                )))
            },
        )
        .prompt(
            Prototype::new("code_review", "Review a diff.").required("diff", ParamKind::String),
            |_ctx, args| async move {
                Ok::<_, flowmcp_server::HandlerError>(PromptOutput::Json(json!(format!(
                    "Please review:\n{}",
                    args["diff"].as_str().unwrap_or_default()
                ))))
            },
        )
        .build()
        .expect("demo server builds")
}

async fn rpc(session: &Arc<flowmcp_server::Session>, frame: Value) -> Option<Value> {
    match session.clone().handle_json_rpc(frame).await? {
        Payload::Bytes(bytes) => Some(serde_json::from_slice(&bytes).expect("valid reply json")),
        Payload::Stream(encoder) => {
            let mut out = Vec::new();
            for chunk in encoder {
                out.extend_from_slice(&chunk.expect("stream chunk"));
            }
            Some(serde_json::from_slice(&out).expect("valid streamed json"))
        }
    }
}

async fn initialized_session(server: &Arc<McpServer>) -> Arc<flowmcp_server::Session> {
    let session = server.create_session("test-session");
    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}},
        }),
    )
    .await
    .expect("initialize replies");
    assert_eq!(reply["result"]["protocolVersion"], json!("2024-11-05"));

    session
}

#[tokio::test]
async fn initialize_advertises_identity_and_capabilities() {
    let server = demo_server();
    let session = server.create_session("s");

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}},
        }),
    )
    .await
    .unwrap();

    assert_eq!(reply["id"], json!(1));
    assert_eq!(
        reply["result"]["serverInfo"],
        json!({"name": "demo-server", "version": "1.2.3"})
    );
    let capabilities = &reply["result"]["capabilities"];
    for always in ["roots", "completions", "logging", "sampling"] {
        assert_eq!(capabilities[always], json!({}));
    }
    assert_eq!(capabilities["tools"], json!({"listChanged": false}));
    assert_eq!(
        capabilities["resources"],
        json!({"subscribe": false, "listChanged": false})
    );
    assert_eq!(capabilities["prompts"], json!({"listChanged": false}));
}

#[tokio::test]
async fn requests_are_gated_on_initialization() {
    let server = demo_server();
    let session = server.create_session("s");

    let reply = rpc(
        &session,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
    )
    .await
    .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32600));

    let session = initialized_session(&server).await;
    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 2, "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}},
        }),
    )
    .await
    .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32600));
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({"jsonrpc": "2.0", "id": 9, "method": "tools/destroy"}),
    )
    .await
    .unwrap();

    assert_eq!(reply["id"], json!(9));
    assert_eq!(reply["error"]["code"], json!(-32601));
    assert_eq!(
        reply["error"]["message"],
        json!("rpc method `tools/destroy` not found")
    );
}

#[tokio::test]
async fn tools_list_is_sorted_and_schematized() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(&session, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .await
        .unwrap();

    let tools = reply["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools
        .iter()
        .map(|tool| tool["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["explode", "get_temperature", "get_user", "list_cities"]);

    let get_temperature = &tools[1];
    assert_eq!(
        get_temperature["inputSchema"],
        json!({"properties": {"city": {"type": "string"}}, "type": "object", "required": ["city"]})
    );
    assert_eq!(
        get_temperature["outputSchema"],
        json!({
            "properties": {"result": {"type": "number"}},
            "required": ["result"],
            "title": "float",
            "type": "object",
        })
    );
}

#[tokio::test]
async fn tool_call_primitive_result() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "get_temperature", "arguments": {"city": "london"}},
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        reply["result"],
        json!({
            "isError": false,
            "content": [{"type": "text", "text": "22.5"}],
            "structuredContent": {"result": 22.5},
        })
    );
}

#[tokio::test]
async fn tool_call_list_result() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": {"name": "list_cities", "arguments": {}},
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        reply["result"],
        json!({
            "isError": false,
            "content": [
                {"type": "text", "text": "London"},
                {"type": "text", "text": "Paris"},
                {"type": "text", "text": "Tokyo"},
            ],
            "structuredContent": {"result": ["London", "Paris", "Tokyo"]},
        })
    );
}

#[tokio::test]
async fn tool_call_record_result() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": {"name": "get_user", "arguments": {"user_id": "alice"}},
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        reply["result"]["structuredContent"],
        json!({"name": "Alice", "age": 30})
    );
    let text = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(text).unwrap(),
        json!({"name": "Alice", "age": 30})
    );
}

#[tokio::test]
async fn tool_handler_failure_is_tool_level_not_protocol_level() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 6, "method": "tools/call",
            "params": {"name": "explode", "arguments": {}},
        }),
    )
    .await
    .unwrap();

    // RPC status is success; the failure is observable in the payload.
    assert!(reply.get("error").is_none());
    assert_eq!(
        reply["result"],
        json!({"isError": true, "content": [{"type": "text", "text": "boom"}]})
    );
}

#[tokio::test]
async fn tool_argument_validation_is_invalid_params() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": {"name": "get_temperature", "arguments": {"town": "london"}},
        }),
    )
    .await
    .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32602));

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 8, "method": "tools/call",
            "params": {"name": "no_such_tool", "arguments": {}},
        }),
    )
    .await
    .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn resource_read_streams_binary_without_interior_padding() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 10, "method": "resources/read",
            "params": {"uri": "res://report"},
        }),
    )
    .await
    .unwrap();

    let content = &reply["result"]["contents"][0];
    assert_eq!(content["uri"], json!("res://report"));
    assert_eq!(content["mimeType"], json!("application/pdf"));

    let blob = content["blob"].as_str().unwrap();
    assert!(!blob.trim_end_matches('=').contains('='));

    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(blob)
        .unwrap();
    assert_eq!(decoded.len(), 5000);
    assert_eq!(decoded[4999], (4999u32 % 249) as u8);
}

#[tokio::test]
async fn resource_read_text_and_template_captures() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 11, "method": "resources/read",
            "params": {"uri": "res://motd"},
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        reply["result"]["contents"][0]["text"],
        json!("hello, world")
    );

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 12, "method": "resources/read",
            "params": {"uri": "res://cities/Paris/weather"},
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        reply["result"]["contents"][0]["text"],
        json!("weather in Paris")
    );
}

#[tokio::test]
async fn resource_errors_follow_the_taxonomy() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    // Unknown resource: invalid params.
    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 13, "method": "resources/read",
            "params": {"uri": "res://nope"},
        }),
    )
    .await
    .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32602));

    // Handler failure: internal error.
    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 14, "method": "resources/read",
            "params": {"uri": "res://flaky"},
        }),
    )
    .await
    .unwrap();
    assert_eq!(reply["error"]["code"], json!(-32603));
}

#[tokio::test]
async fn resource_listings_split_concrete_and_templates() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({"jsonrpc": "2.0", "id": 15, "method": "resources/list"}),
    )
    .await
    .unwrap();
    let uris: Vec<&str> = reply["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|resource| resource["uri"].as_str().unwrap())
        .collect();
    assert_eq!(uris, ["res://flaky", "res://motd", "res://report"]);

    let reply = rpc(
        &session,
        json!({"jsonrpc": "2.0", "id": 16, "method": "resources/templates/list"}),
    )
    .await
    .unwrap();
    assert_eq!(
        reply["result"]["resourceTemplates"][0]["uriTemplate"],
        json!("res://cities/{city}/weather")
    );
}

#[tokio::test]
async fn prompts_list_and_get() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({"jsonrpc": "2.0", "id": 17, "method": "prompts/list"}),
    )
    .await
    .unwrap();
    assert_eq!(
        reply["result"]["prompts"],
        json!([{
            "name": "code_review",
            "description": "Review a diff.",
            "arguments": [{"name": "diff", "required": true}],
        }])
    );

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 18, "method": "prompts/get",
            "params": {"name": "code_review", "arguments": {"diff": "+1 -1"}},
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        reply["result"]["messages"],
        json!([{
            "role": "user",
            "content": {"type": "text", "text": "Please review:\n+1 -1"},
        }])
    );
}

#[tokio::test]
async fn completion_dispatches_by_ref_type() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 19, "method": "completion/complete",
            "params": {
                "ref": {"type": "ref/resource", "uri": "res://cities/{city}/weather"},
                "argument": {"name": "city", "value": "L"},
            },
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        reply["result"],
        json!({"completion": {"values": ["London", "Lisbon"]}})
    );

    // Prompts have no completer registered: empty values, not an error.
    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 20, "method": "completion/complete",
            "params": {
                "ref": {"type": "ref/prompt", "name": "code_review"},
                "argument": {"name": "diff", "value": ""},
            },
        }),
    )
    .await
    .unwrap();
    assert_eq!(reply["result"], json!({"completion": {"values": []}}));
}

#[tokio::test]
async fn notifications_produce_no_reply() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    for _ in 0..2 {
        let reply = session
            .clone()
            .handle_json_rpc(json!({
                "jsonrpc": "2.0", "method": "notifications/cancelled",
                "params": {"requestId": 3, "reason": "user gave up"},
            }))
            .await;
        assert!(reply.is_none());
    }
}

#[tokio::test]
async fn roots_are_fetched_after_initialized_when_advertised() {
    let server = demo_server();
    let session = server.create_session("roots-session");

    rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {"roots": {"listChanged": false}}},
        }),
    )
    .await
    .unwrap();

    let reply = session
        .clone()
        .handle_json_rpc(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    assert!(reply.is_none());
    assert_eq!(session.pending_responses(), 1);

    // Answer the server's roots/list request (its first request id is 1).
    let reply = session
        .clone()
        .handle_json_rpc(json!({
            "jsonrpc": "2.0", "id": 1,
            "result": {"roots": [{"name": "workspace", "uri": "file:///workspace"}]},
        }))
        .await;
    assert!(reply.is_none());
    assert_eq!(session.pending_responses(), 0);

    let roots = session.roots();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].name.as_deref(), Some("workspace"));
    assert_eq!(roots[0].uri, "file:///workspace");
}

#[tokio::test]
async fn stray_results_are_silently_dropped() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = session
        .clone()
        .handle_json_rpc(json!({"jsonrpc": "2.0", "id": 999, "result": {"anything": true}}))
        .await;
    assert!(reply.is_none());
}

#[tokio::test]
async fn resource_can_stream_an_open_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(&[42u8; 1000]).expect("write");
    let path = file.path().to_owned();

    let server = McpServer::builder()
        .name("files")
        .chunk_size(30)
        .resource(
            "res://dump",
            None,
            Some("application/octet-stream".to_owned()),
            None,
            move |_ctx, _req| {
                let path = path.clone();
                async move {
                    let file = std::fs::File::open(&path)?;
                    Ok::<_, flowmcp_server::HandlerError>(ResourceOutput::Reader(Box::new(file)))
                }
            },
        )
        .build()
        .unwrap();
    let session = initialized_session(&server).await;

    let reply = rpc(
        &session,
        json!({
            "jsonrpc": "2.0", "id": 30, "method": "resources/read",
            "params": {"uri": "res://dump"},
        }),
    )
    .await
    .unwrap();

    use base64::Engine;
    let blob = reply["result"]["contents"][0]["blob"].as_str().unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(blob)
        .unwrap();
    assert_eq!(decoded, vec![42u8; 1000]);
}

#[tokio::test]
async fn ping_request_gets_empty_result() {
    let server = demo_server();
    let session = initialized_session(&server).await;

    let reply = rpc(&session, json!({"jsonrpc": "2.0", "id": 21, "method": "ping"}))
        .await
        .unwrap();
    assert_eq!(reply["result"], json!({}));
}
