//! # Per-client session
//!
//! One [`Session`] per SSE connection (plus the process-lived `stdio`
//! session). The session owns the outbound queue, the monotonic server-side
//! request id, the pending-response table, the client-declared capabilities
//! and roots, and the logging threshold. Incoming frames are discriminated
//! and dispatched here; outgoing frames are enqueued and written by the
//! single sending loop that owns the connection.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use flowmcp_protocol::jsonrpc::{self, Frame, JsonRpcErrorCode, RequestId};
use flowmcp_protocol::streaming::StreamingResponse;
use flowmcp_protocol::LogLevel;

use crate::context::RequestContext;
use crate::handler::Reply;
use crate::router::Router;

/// How long the sending loop blocks on its queue before running cleanup
pub const QUEUE_WAIT: Duration = Duration::from_secs(1);

/// Age bound for pending response callbacks, and the cleanup cadence
pub const CLEANUP_PERIODICITY: Duration = Duration::from_secs(10);

/// A root advertised by the client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Root {
    /// Optional display name
    pub name: Option<String>,
    /// Root URI
    pub uri: String,
}

/// Callback for a server-initiated request.
///
/// Callbacks receive the session at invocation time instead of capturing
/// it, so the pending-response table never keeps the session alive.
pub type ResponseCallback = Box<dyn FnOnce(&Session, Value) + Send>;

/// An outbound payload: either a complete frame or a lazy byte stream
pub enum Payload {
    /// Complete frame bytes, written in one go
    Bytes(Bytes),
    /// Lazy streamed response, written chunk by chunk
    Stream(StreamingResponse),
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<StreamingResponse> for Payload {
    fn from(stream: StreamingResponse) -> Self {
        Payload::Stream(stream)
    }
}

/// One queued SSE event
pub struct Outbound {
    /// SSE event type (`endpoint` or `message`)
    pub event: String,
    /// Event data
    pub payload: Payload,
}

struct PendingResponse {
    issued_at: Instant,
    callback: ResponseCallback,
}

struct SessionState {
    initialized: bool,
    client_capabilities: Map<String, Value>,
    roots: HashSet<Root>,
    logging_level: LogLevel,
    next_request_id: u64,
    last_sent: Instant,
    last_cleanup: Instant,
}

/// Per-client session state and dispatch
pub struct Session {
    id: String,
    chunk_size: usize,
    router: Arc<Router>,
    tx: mpsc::UnboundedSender<Outbound>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    state: Mutex<SessionState>,
    callbacks: Mutex<BTreeMap<u64, PendingResponse>>,
}

impl Session {
    /// Create a session; the receiver half of the outbound queue stays
    /// inside until the sending loop claims it
    pub fn new(id: impl Into<String>, router: Arc<Router>, chunk_size: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let now = Instant::now();

        Arc::new(Self {
            id: id.into(),
            chunk_size,
            router,
            tx,
            rx: Mutex::new(Some(rx)),
            state: Mutex::new(SessionState {
                initialized: false,
                client_capabilities: Map::new(),
                roots: HashSet::new(),
                logging_level: LogLevel::Error,
                next_request_id: 0,
                last_sent: now,
                last_cleanup: now,
            }),
            callbacks: Mutex::new(BTreeMap::new()),
        })
    }

    /// Session identifier (a UUID, or the literal `stdio`)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Streaming chunk size for `resources/read` responses
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Enqueue an event for the sending loop.
    ///
    /// Silently drops the event if the sending loop is gone (the client
    /// disconnected); the session is about to be removed anyway.
    pub fn send(&self, event: &str, payload: impl Into<Payload>) {
        let _ = self.tx.send(Outbound {
            event: event.to_owned(),
            payload: payload.into(),
        });
    }

    /// Claim the receiver half of the outbound queue; only the first caller
    /// gets it
    pub(crate) fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<Outbound>> {
        self.rx.lock().take()
    }

    // --- Incoming frames -------------------------------------------------

    /// Discriminate and dispatch one incoming frame.
    ///
    /// Returns the reply payload for requests; notifications, responses and
    /// error frames produce none.
    pub async fn handle_json_rpc(self: Arc<Self>, frame: Value) -> Option<Payload> {
        match Frame::classify(frame) {
            Some(Frame::Request { id, method, params }) => {
                Self::handle_request(&self, id, &method, params).await
            }
            Some(Frame::Notification { method, params }) => {
                Self::handle_notification(&self, &method, params).await;
                None
            }
            Some(Frame::Error { id, error }) => {
                tracing::error!(
                    session = %self.id,
                    code = error.code,
                    message = %error.message,
                    request_id = ?id,
                    "error frame received",
                );
                None
            }
            Some(Frame::Response { id, result }) => {
                match id {
                    Some(RequestId::Number(n)) if n >= 0 => {
                        self.handle_response(n as u64, result);
                    }
                    other => {
                        tracing::debug!(session = %self.id, id = ?other, "response with unknown id shape");
                    }
                }
                None
            }
            None => {
                tracing::error!(session = %self.id, "invalid json RPC frame");
                None
            }
        }
    }

    async fn handle_request(
        session: &Arc<Session>,
        id: RequestId,
        method: &str,
        params: Value,
    ) -> Option<Payload> {
        let this = session.as_ref();
        tracing::debug!(session = %this.id, %method, "calling JSON-RPC method");

        // Lifecycle gate: nothing but `initialize` before initialization,
        // and `initialize` only once.
        let initialized = this.state.lock().initialized;
        if method == "initialize" && initialized {
            return Some(Payload::Bytes(jsonrpc::encode_error(
                Some(&id),
                JsonRpcErrorCode::InvalidRequest,
                "session already initialized",
            )));
        }
        if method != "initialize" && !initialized {
            return Some(Payload::Bytes(jsonrpc::encode_error(
                Some(&id),
                JsonRpcErrorCode::InvalidRequest,
                "session not initialized",
            )));
        }

        let Some(handler) = this.router.resolve(method) else {
            return Some(Payload::Bytes(jsonrpc::encode_error(
                Some(&id),
                JsonRpcErrorCode::MethodNotFound,
                &format!("rpc method `{method}` not found"),
            )));
        };

        let ctx = RequestContext::new(session.clone(), Some(id.clone()), progress_token(&params));

        match handler.handle(ctx, params).await {
            Ok(Reply::Result(result)) => {
                Some(Payload::Bytes(jsonrpc::encode_response(&id, &result)))
            }
            Ok(Reply::Stream(streams)) => {
                match StreamingResponse::with_chunk_size(&id, streams, this.chunk_size) {
                    Ok(stream) => Some(Payload::Stream(stream)),
                    Err(error) => {
                        tracing::error!(session = %this.id, %error, "streaming response setup failed");
                        Some(Payload::Bytes(jsonrpc::encode_error(
                            Some(&id),
                            JsonRpcErrorCode::InternalError,
                            &error.to_string(),
                        )))
                    }
                }
            }
            Ok(Reply::None) => None,
            Err(error) => {
                tracing::error!(session = %this.id, %method, %error, "JSON-RPC method failed");
                Some(Payload::Bytes(jsonrpc::encode_error(
                    Some(&id),
                    error.jsonrpc_code(),
                    &error.to_string(),
                )))
            }
        }
    }

    async fn handle_notification(session: &Arc<Session>, method: &str, params: Value) {
        let Some(handler) = session.router.resolve(method) else {
            tracing::debug!(session = %session.id, %method, "unhandled notification");
            return;
        };

        let ctx = RequestContext::new(session.clone(), None, progress_token(&params));
        if let Err(error) = handler.handle(ctx, params).await {
            tracing::error!(session = %session.id, %method, %error, "notification handler failed");
        }
    }

    /// Invoke and drop the pending callback for `id`, if any.
    ///
    /// A result with no matching callback is silently dropped.
    fn handle_response(&self, id: u64, result: Value) {
        let pending = self.callbacks.lock().remove(&id);
        match pending {
            Some(pending) => (pending.callback)(self, result),
            None => {
                tracing::debug!(session = %self.id, id, "response without pending callback");
            }
        }
    }

    // --- Server-initiated requests ---------------------------------------

    /// Allocate the next request id, register the response callback, and
    /// return the serialized request frame
    pub fn create_rpc_request(
        &self,
        method: &str,
        callback: ResponseCallback,
        params: Value,
    ) -> Bytes {
        let id = {
            let mut state = self.state.lock();
            state.next_request_id += 1;
            state.next_request_id
        };
        self.callbacks.lock().insert(
            id,
            PendingResponse {
                issued_at: Instant::now(),
                callback,
            },
        );

        jsonrpc::encode_request(&RequestId::Number(id as i64), method, &params)
    }

    /// Number of response callbacks still pending
    pub fn pending_responses(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Ask the client for its roots; the stored set is replaced when the
    /// response arrives
    pub fn list_roots(&self) {
        let frame = self.create_rpc_request(
            "roots/list",
            Box::new(|session, result| {
                let roots: HashSet<Root> = result
                    .get("roots")
                    .and_then(Value::as_array)
                    .map(|roots| {
                        roots
                            .iter()
                            .filter_map(|root| {
                                Some(Root {
                                    name: root.get("name").and_then(Value::as_str).map(String::from),
                                    uri: root.get("uri")?.as_str()?.to_owned(),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                tracing::debug!(session = %session.id, count = roots.len(), "roots received");
                session.state.lock().roots = roots;
            }),
            json!({}),
        );

        self.send("message", frame);
    }

    // --- Client-declared state -------------------------------------------

    /// Record the client handshake; the session accepts regular requests
    /// from here on
    pub fn initialize(&self, protocol_version: &str, capabilities: Map<String, Value>) {
        tracing::info!(
            session = %self.id,
            client_protocol_version = %protocol_version,
            capabilities = %capabilities.keys().cloned().collect::<Vec<_>>().join(", "),
            "client initialized",
        );

        let mut state = self.state.lock();
        state.initialized = true;
        state.client_capabilities = capabilities;
    }

    /// Whether the client advertised the given capability
    pub fn client_has_capability(&self, name: &str) -> bool {
        self.state.lock().client_capabilities.contains_key(name)
    }

    /// Roots advertised by the client, as last fetched
    pub fn roots(&self) -> Vec<Root> {
        self.state.lock().roots.iter().cloned().collect()
    }

    /// Set the forwarding threshold for `notifications/message`
    pub fn set_logging_level(&self, level: LogLevel) {
        self.state.lock().logging_level = level;
    }

    /// Forward a log record to the client iff `level` reaches the session
    /// threshold
    pub fn log(&self, level: LogLevel, data: Value, logger: Option<&str>) {
        if level < self.state.lock().logging_level {
            return;
        }

        let mut params = json!({"level": level, "data": data});
        if let Some(logger) = logger {
            params["logger"] = json!(logger);
        }

        self.send(
            "message",
            jsonrpc::encode_notification("notifications/message", Some(&params)),
        );
    }

    // --- Sending loop ----------------------------------------------------

    /// Ping-and-prune pass, run whenever the queue wait times out.
    ///
    /// Enqueues a ping when nothing was sent for `ping_timeout`, and every
    /// [`CLEANUP_PERIODICITY`] drops the expired prefix of the pending
    /// response table without invoking the callbacks.
    pub fn cleanup(&self, ping_timeout: Duration) {
        let now = Instant::now();

        let ping_due = {
            let state = self.state.lock();
            state
                .last_sent
                .checked_add(ping_timeout)
                .is_some_and(|deadline| now > deadline)
        };
        if ping_due {
            self.send("message", jsonrpc::encode_notification("ping", None));
        }

        let cleanup_due = {
            let mut state = self.state.lock();
            if now > state.last_cleanup + CLEANUP_PERIODICITY {
                state.last_cleanup = now;
                true
            } else {
                false
            }
        };
        if cleanup_due {
            // Ids are monotonic and timestamps non-decreasing, so dropping
            // the expired prefix is enough.
            let mut callbacks = self.callbacks.lock();
            while let Some(entry) = callbacks.first_entry() {
                if now > entry.get().issued_at + CLEANUP_PERIODICITY {
                    entry.remove();
                } else {
                    break;
                }
            }
        }
    }

    fn touch_last_sent(&self) {
        self.state.lock().last_sent = Instant::now();
    }

    /// The sending loop, as a stream of raw SSE bytes.
    ///
    /// Event ids are strictly increasing from 0. Lazy payloads are written
    /// chunk by chunk inside a single event; a failing chunk ends the
    /// stream (the connection cannot carry a half-written event). Payload
    /// readers are dropped, and thereby released, on every exit path.
    pub fn event_stream(
        self: Arc<Self>,
        ping_timeout: Duration,
    ) -> impl Stream<Item = std::io::Result<Bytes>> {
        async_stream::stream! {
            let Some(mut rx) = self.take_receiver() else {
                tracing::error!(session = %self.id, "sending loop already running");
                return;
            };

            let mut event_id: u64 = 0;
            loop {
                let outbound = match tokio::time::timeout(QUEUE_WAIT, rx.recv()).await {
                    Err(_) => {
                        self.cleanup(ping_timeout);
                        continue;
                    }
                    Ok(None) => break,
                    Ok(Some(outbound)) => outbound,
                };

                yield Ok(Bytes::from(format!(
                    "id: {event_id}\nevent: {}\ndata: ",
                    outbound.event
                )));
                match outbound.payload {
                    Payload::Bytes(bytes) => yield Ok(bytes),
                    Payload::Stream(encoder) => {
                        for chunk in encoder {
                            match chunk {
                                Ok(bytes) => yield Ok(bytes),
                                Err(error) => {
                                    tracing::error!(session = %self.id, %error, "streamed payload failed");
                                    yield Err(error);
                                    return;
                                }
                            }
                        }
                    }
                }
                yield Ok(Bytes::from_static(b"\n\n"));

                self.touch_last_sent();
                event_id += 1;
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("chunk_size", &self.chunk_size)
            .field("pending_responses", &self.pending_responses())
            .finish()
    }
}

fn progress_token(params: &Value) -> Option<Value> {
    params.get("_meta")?.get("progressToken").cloned()
}
