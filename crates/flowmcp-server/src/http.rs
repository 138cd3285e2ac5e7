//! # HTTP/SSE front-end
//!
//! Two routes: `GET /` opens an SSE stream (session allocation, `endpoint`
//! event, then the sending loop as the response body) and
//! `POST /{session_id}` feeds one JSON-RPC frame to a session, answering
//! `202 ACCEPTED` while the actual reply travels back over SSE.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use uuid::Uuid;

use crate::server::McpServer;

/// The axum application for a server
pub(crate) fn app(server: Arc<McpServer>) -> axum::Router {
    axum::Router::new()
        .route("/", get(create_channel))
        .route("/{session_id}", post(handle_json_rpc))
        .with_state(server)
}

/// Removes the session from the map when the SSE body is dropped.
///
/// Client disconnects surface as the body stream being dropped, so this is
/// the single cleanup path for both orderly and broken-pipe exits.
struct Disconnect {
    server: Arc<McpServer>,
    session_id: String,
}

impl Drop for Disconnect {
    fn drop(&mut self) {
        self.server.remove_session(&self.session_id);
        tracing::debug!(session = %self.session_id, "session disconnected");
    }
}

async fn create_channel(
    State(server): State<Arc<McpServer>>,
    headers: HeaderMap,
) -> Response {
    let session_id = Uuid::new_v4().to_string();
    let session = server.create_session(session_id.clone());
    tracing::debug!(session = %session_id, "session created");

    // First event: the per-session POST endpoint the client must use.
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("127.0.0.1");
    session.send(
        "endpoint",
        Bytes::from(format!("http://{host}/{session_id}")),
    );

    let events = session.clone().event_stream(server.ping_timeout());
    let body = async_stream::stream! {
        let _guard = Disconnect { server, session_id };
        futures::pin_mut!(events);
        while let Some(item) = events.next().await {
            match item {
                Ok(bytes) => yield Ok::<Bytes, Infallible>(bytes),
                // Already logged by the sending loop; a half-written event
                // cannot be recovered, so the connection ends here.
                Err(_) => break,
            }
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

async fn handle_json_rpc(
    State(server): State<Arc<McpServer>>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> StatusCode {
    let Some(session) = server.session(&session_id) else {
        return StatusCode::NOT_FOUND;
    };

    let frame: Value = match serde_json::from_slice(&body) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::error!(session = %session_id, %error, "invalid json RPC body");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Some(payload) = session.clone().handle_json_rpc(frame).await {
        session.send("message", payload);
    }

    StatusCode::ACCEPTED
}
