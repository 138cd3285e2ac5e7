//! # Client side of the HTTP+SSE transport
//!
//! A background task drains the SSE stream into a channel; the client
//! discovers its per-session POST endpoint from the first event, performs
//! the `initialize` handshake, and then pairs posted requests with the
//! response frames coming back over SSE. Server-initiated `roots/list`
//! requests are answered from the roots given on the command line.

use futures::StreamExt;
use reqwest::header;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use flowmcp_protocol::PROTOCOL_VERSION;

/// How long to wait for any single server event
const EVENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Client-side errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Transport-level failure (connection, stream, status)
    #[error("{0}")]
    Transport(String),

    /// HTTP failure
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Undecodable frame
    #[error("invalid frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// JSON-RPC error frame from the server
    #[error("{message} ({code})")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },
}

/// One parsed SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `message` when the stream didn't name one
    pub event: String,
    /// Event data, multi-line `data:` fields joined
    pub data: String,
    /// Last seen `id:` field
    pub id: Option<String>,
}

/// Incremental SSE parser over raw byte chunks
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    /// Feed a chunk and drain every complete event block
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..pos])) {
                events.push(event);
            }
        }

        events
    }
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = "message".to_owned();
    let mut data: Vec<&str> = Vec::new();
    let mut id = None;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.strip_prefix(' ').unwrap_or(rest).to_owned();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if let Some(rest) = line.strip_prefix("id:") {
            id = Some(rest.strip_prefix(' ').unwrap_or(rest).to_owned());
        }
    }

    if data.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data.join("\n"),
        id,
    })
}

/// A connected, initialized MCP client
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
    events: mpsc::UnboundedReceiver<Result<SseEvent, String>>,
    roots: Vec<(String, String)>,
    next_id: i64,
    /// The `initialize` result
    pub server_info: Value,
}

impl Client {
    /// Open the SSE stream, discover the endpoint, and run the handshake
    pub async fn connect(url: &str, roots: Vec<(String, String)>) -> Result<Self, CliError> {
        let http = reqwest::Client::new();
        let (tx, events) = mpsc::unbounded_channel();

        let listener = http.clone();
        let sse_url = url.to_owned();
        tokio::spawn(async move {
            let outcome = async {
                let response = listener
                    .get(&sse_url)
                    .header(header::ACCEPT, "text/event-stream")
                    .send()
                    .await?
                    .error_for_status()?;

                let mut stream = response.bytes_stream();
                let mut parser = SseParser::default();
                while let Some(chunk) = stream.next().await {
                    for event in parser.push(&chunk?) {
                        if tx.send(Ok(event)).is_err() {
                            return Ok(());
                        }
                    }
                }

                Ok::<(), reqwest::Error>(())
            }
            .await;

            if let Err(error) = outcome {
                let _ = tx.send(Err(error.to_string()));
            }
        });

        let mut client = Self {
            http,
            endpoint: String::new(),
            events,
            roots,
            next_id: 0,
            server_info: Value::Null,
        };

        // First event carries the per-session POST endpoint.
        loop {
            let event = client.next_event().await?;
            if event.event == "endpoint" {
                client.endpoint = join_url(url, &event.data);
                break;
            }
        }

        client.server_info = client
            .send(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"roots": {"listChanged": false}},
                    "clientInfo": {"name": "flowmcp-cli", "version": env!("CARGO_PKG_VERSION")},
                }),
            )
            .await?;
        client
            .post(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;

        Ok(client)
    }

    /// Send a request and wait for its result
    pub async fn send(&mut self, method: &str, params: Value) -> Result<Value, CliError> {
        self.next_id += 1;
        self.post(&json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": method,
            "params": params,
        }))
        .await?;

        self.wait_result().await
    }

    async fn post(&self, frame: &Value) -> Result<(), CliError> {
        self.http
            .post(&self.endpoint)
            .json(frame)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn next_event(&mut self) -> Result<SseEvent, CliError> {
        match tokio::time::timeout(EVENT_TIMEOUT, self.events.recv()).await {
            Err(_) => Err(CliError::Transport(
                "timed out waiting for a server event".to_owned(),
            )),
            Ok(None) => Err(CliError::Transport("event stream closed".to_owned())),
            Ok(Some(Err(error))) => Err(CliError::Transport(error)),
            Ok(Some(Ok(event))) => Ok(event),
        }
    }

    /// Wait for the next response frame, answering server-initiated
    /// requests along the way
    async fn wait_result(&mut self) -> Result<Value, CliError> {
        loop {
            let event = self.next_event().await?;
            if event.event != "message" {
                continue;
            }

            let frame: Value = serde_json::from_str(&event.data)?;

            if let Some(method) = frame.get("method").and_then(Value::as_str) {
                if method == "roots/list"
                    && let Some(id) = frame.get("id")
                {
                    self.answer_roots(id.clone()).await?;
                }
                // Pings and notifications need no answer.
                continue;
            }

            if let Some(error) = frame.get("error") {
                return Err(CliError::Rpc {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_owned(),
                });
            }

            if let Some(result) = frame.get("result") {
                return Ok(result.clone());
            }
        }
    }

    async fn answer_roots(&self, id: Value) -> Result<(), CliError> {
        let roots: Vec<Value> = self
            .roots
            .iter()
            .map(|(name, uri)| json!({"name": name, "uri": uri}))
            .collect();

        self.post(&json!({"jsonrpc": "2.0", "id": id, "result": {"roots": roots}}))
            .await
    }
}

/// Resolve a possibly relative endpoint against the SSE URL's origin
fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_owned();
    }

    let origin = match base.find("://") {
        Some(scheme_end) => match base[scheme_end + 3..].find('/') {
            Some(path_start) => &base[..scheme_end + 3 + path_start],
            None => base,
        },
        None => base,
    };

    format!("{}/{}", origin.trim_end_matches('/'), endpoint.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parser_handles_split_chunks() {
        let mut parser = SseParser::default();

        assert!(parser.push(b"id: 0\nevent: end").is_empty());
        let events = parser.push(b"point\ndata: http://x/abc\n\nid: 1\nevent: message\ndata: {}\n\n");

        assert_eq!(
            events,
            [
                SseEvent {
                    event: "endpoint".to_owned(),
                    data: "http://x/abc".to_owned(),
                    id: Some("0".to_owned()),
                },
                SseEvent {
                    event: "message".to_owned(),
                    data: "{}".to_owned(),
                    id: Some("1".to_owned()),
                },
            ]
        );
    }

    #[test]
    fn parser_joins_multiline_data() {
        let mut parser = SseParser::default();
        let events = parser.push(b"data: first\ndata: second\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn join_url_resolves_relative_endpoints() {
        assert_eq!(
            join_url("http://127.0.0.1:9000/", "abc-def"),
            "http://127.0.0.1:9000/abc-def"
        );
        assert_eq!(
            join_url("http://127.0.0.1:9000/", "http://other/xyz"),
            "http://other/xyz"
        );
        assert_eq!(
            join_url("http://host/deep/path", "/session"),
            "http://host/session"
        );
    }
}
