//! # Request-scoped services
//!
//! Every handler invocation receives a [`RequestContext`]: the session the
//! request arrived on, the request id, and the progress token from
//! `_meta.progressToken` when the client supplied one. The context exposes
//! the per-request emitters (progress, log, cancel, sample) that the
//! original runtime injected implicitly.

use std::sync::Arc;

use serde_json::{json, Value};

use flowmcp_protocol::content::CreateMessageParams;
use flowmcp_protocol::jsonrpc::{self, RequestId};
use flowmcp_protocol::LogLevel;

use crate::session::{Payload, ResponseCallback, Root, Session};

/// Per-request services handed to every handler
#[derive(Clone)]
pub struct RequestContext {
    session: Arc<Session>,
    request_id: Option<RequestId>,
    progress_token: Option<Value>,
}

impl RequestContext {
    /// Context for a request or notification on `session`
    pub fn new(
        session: Arc<Session>,
        request_id: Option<RequestId>,
        progress_token: Option<Value>,
    ) -> Self {
        Self {
            session,
            request_id,
            progress_token,
        }
    }

    /// Session the request arrived on
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Id of the request being served, absent for notifications
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Roots advertised by the client, as last fetched
    pub fn roots(&self) -> Vec<Root> {
        self.session.roots()
    }

    /// Emit a `notifications/progress` frame.
    ///
    /// No-op when the request carried no progress token.
    pub fn progress(&self, progress: f64, total: Option<f64>, message: Option<&str>) {
        let Some(token) = &self.progress_token else {
            return;
        };

        let mut params = json!({"progressToken": token, "progress": progress});
        if let Some(total) = total {
            params["total"] = json!(total);
        }
        if let Some(message) = message {
            params["message"] = json!(message);
        }

        self.session.send(
            "message",
            Payload::Bytes(jsonrpc::encode_notification(
                "notifications/progress",
                Some(&params),
            )),
        );
    }

    /// Forward a log record to the client, subject to the session threshold
    pub fn log(&self, level: LogLevel, data: Value, logger: Option<&str>) {
        self.session.log(level, data, logger);
    }

    /// Emit a `notifications/cancelled` frame for this request
    pub fn cancel(&self, reason: Option<&str>) {
        let Some(request_id) = &self.request_id else {
            return;
        };

        let mut params = json!({"requestId": request_id});
        if let Some(reason) = reason {
            params["reason"] = json!(reason);
        }

        self.session.send(
            "message",
            Payload::Bytes(jsonrpc::encode_notification(
                "notifications/cancelled",
                Some(&params),
            )),
        );
    }

    /// Issue a `sampling/createMessage` request to the client.
    ///
    /// The callback is registered in the session's pending-response table
    /// and invoked with the sampling result when the client answers; it is
    /// dropped unseen if the client never does.
    pub fn sample(&self, params: CreateMessageParams, callback: ResponseCallback) {
        let params = match serde_json::to_value(&params) {
            Ok(params) => params,
            Err(error) => {
                tracing::error!(session = %self.session.id(), %error, "unserializable sampling request");
                return;
            }
        };

        let frame = self
            .session
            .create_rpc_request("sampling/createMessage", callback, params);
        self.session.send("message", Payload::Bytes(frame));
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("session", &self.session.id())
            .field("request_id", &self.request_id)
            .field("progress_token", &self.progress_token)
            .finish()
    }
}
