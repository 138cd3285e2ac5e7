//! # JSON-RPC 2.0 frames
//!
//! Frame types, the standard error code table, compact byte encoding, and
//! classification of incoming frames into the four shapes the dispatcher
//! cares about (request / notification / response / error).

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC version type
///
/// Serializes to the literal `"2.0"` and refuses anything else on the way in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// Request identifier: a number or a string, per JSON-RPC 2.0
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier
    Number(i64),
    /// String identifier
    String(String),
}

impl RequestId {
    /// Extract a request id from a raw JSON value, if it has an id shape
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_owned())
    }
}

/// JSON-RPC request message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request identifier
    pub id: RequestId,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC notification message (no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Notification method name
    pub method: String,
    /// Notification parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    /// Parse error (-32700)
    ParseError,
    /// Invalid request (-32600)
    InvalidRequest,
    /// Method not found (-32601)
    MethodNotFound,
    /// Invalid params (-32602)
    InvalidParams,
    /// Internal error (-32603)
    InternalError,
    /// Application-defined error
    ApplicationError(i32),
}

impl JsonRpcErrorCode {
    /// Get the numeric error code
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ApplicationError(code) => *code,
        }
    }

    /// Get the standard error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ApplicationError(_) => "Application error",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl From<JsonRpcErrorCode> for JsonRpcError {
    fn from(code: JsonRpcErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: None,
        }
    }
}

/// An incoming frame, classified by shape.
///
/// A frame with `method` and `id` is a request; with `method` only, a
/// notification; with `result`, a response to a server-initiated request;
/// with `error`, an error report. Anything else is rejected upstream.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Client-to-server request; must produce exactly one response
    Request {
        /// Request identifier, echoed in the response
        id: RequestId,
        /// Slash-separated method path
        method: String,
        /// Parameters (an object, possibly empty)
        params: Value,
    },
    /// Notification; never produces a response
    Notification {
        /// Slash-separated method path
        method: String,
        /// Parameters (an object, possibly empty)
        params: Value,
    },
    /// Response carrying the result of a server-initiated request
    Response {
        /// Identifier of the server-side request being answered
        id: Option<RequestId>,
        /// Result payload
        result: Value,
    },
    /// Error frame from the peer
    Error {
        /// Identifier of the failed request, when present
        id: Option<RequestId>,
        /// Error payload
        error: JsonRpcError,
    },
}

impl Frame {
    /// Classify a decoded JSON value into one of the four frame shapes.
    ///
    /// Returns `None` for values with none of them (no `method`, `result`
    /// or `error` member).
    pub fn classify(value: Value) -> Option<Frame> {
        let Value::Object(mut frame) = value else {
            return None;
        };

        let id = frame.get("id").and_then(RequestId::from_value);

        if let Some(method) = frame.get("method").and_then(Value::as_str) {
            let method = method.replace('.', "/");
            let params = match frame.remove("params") {
                Some(params @ Value::Object(_)) => params,
                _ => json!({}),
            };

            return Some(match id {
                Some(id) => Frame::Request { id, method, params },
                None => Frame::Notification { method, params },
            });
        }

        if let Some(error) = frame.remove("error") {
            let error = serde_json::from_value(error).ok()?;
            return Some(Frame::Error { id, error });
        }

        frame
            .remove("result")
            .map(|result| Frame::Response { id, result })
    }
}

/// Encode a request frame to compact bytes
pub fn encode_request(id: &RequestId, method: &str, params: &Value) -> Bytes {
    encode(&json!({"jsonrpc": JSONRPC_VERSION, "id": id, "method": method, "params": params}))
}

/// Encode a notification frame to compact bytes
pub fn encode_notification(method: &str, params: Option<&Value>) -> Bytes {
    match params {
        Some(params) => encode(&json!({"jsonrpc": JSONRPC_VERSION, "method": method, "params": params})),
        None => encode(&json!({"jsonrpc": JSONRPC_VERSION, "method": method})),
    }
}

/// Encode a success response frame to compact bytes
pub fn encode_response(id: &RequestId, result: &Value) -> Bytes {
    encode(&json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result}))
}

/// Encode an error response frame to compact bytes
pub fn encode_error(id: Option<&RequestId>, code: JsonRpcErrorCode, message: &str) -> Bytes {
    encode_error_with_data(id, code, message, None)
}

/// Encode an error response frame carrying an optional `data` member
pub fn encode_error_with_data(
    id: Option<&RequestId>,
    code: JsonRpcErrorCode,
    message: &str,
    data: Option<Value>,
) -> Bytes {
    let mut error = json!({"code": code.code(), "message": message});
    if let Some(data) = data {
        error["data"] = data;
    }

    encode(&json!({"jsonrpc": JSONRPC_VERSION, "id": id, "error": error}))
}

fn encode(frame: &Value) -> Bytes {
    // serde_json emits compact separators; the frame is built from values
    // that cannot fail to serialize.
    Bytes::from(serde_json::to_vec(frame).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_round_trip() {
        let json = serde_json::to_string(&JsonRpcVersion).unwrap();
        assert_eq!(json, "\"2.0\"");

        let parsed: JsonRpcVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, JsonRpcVersion);

        assert!(serde_json::from_str::<JsonRpcVersion>("\"1.0\"").is_err());
    }

    #[test]
    fn classify_request() {
        let frame = Frame::classify(json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "echo"}
        }));

        match frame {
            Some(Frame::Request { id, method, params }) => {
                assert_eq!(id, RequestId::Number(1));
                assert_eq!(method, "tools/call");
                assert_eq!(params, json!({"name": "echo"}));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classify_dotted_method() {
        let frame = Frame::classify(json!({"jsonrpc": "2.0", "id": 1, "method": "tools.call"}));
        match frame {
            Some(Frame::Request { method, .. }) => assert_eq!(method, "tools/call"),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classify_notification() {
        let frame = Frame::classify(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert!(matches!(frame, Some(Frame::Notification { .. })));
    }

    #[test]
    fn classify_response_and_error() {
        let frame = Frame::classify(json!({"jsonrpc": "2.0", "id": 3, "result": {"roots": []}}));
        match frame {
            Some(Frame::Response { id, result }) => {
                assert_eq!(id, Some(RequestId::Number(3)));
                assert_eq!(result, json!({"roots": []}));
            }
            other => panic!("expected response, got {other:?}"),
        }

        let frame = Frame::classify(json!({
            "jsonrpc": "2.0", "id": 3, "error": {"code": -32601, "message": "nope"}
        }));
        assert!(matches!(frame, Some(Frame::Error { .. })));
    }

    #[test]
    fn classify_rejects_shapeless_frames() {
        assert!(Frame::classify(json!({"jsonrpc": "2.0"})).is_none());
        assert!(Frame::classify(json!([1, 2, 3])).is_none());
        assert!(Frame::classify(json!("ping")).is_none());
    }

    #[test]
    fn encoding_is_compact() {
        let bytes = encode_response(&RequestId::Number(1), &json!({"a": 1, "b": [1, 2]}));
        assert_eq!(&bytes[..], br#"{"jsonrpc":"2.0","id":1,"result":{"a":1,"b":[1,2]}}"#);
    }

    #[test]
    fn notification_without_params_omits_the_member() {
        let bytes = encode_notification("ping", None);
        assert_eq!(&bytes[..], br#"{"jsonrpc":"2.0","method":"ping"}"#);
    }

    #[test]
    fn error_code_table() {
        assert_eq!(JsonRpcErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(JsonRpcErrorCode::InvalidParams.code(), -32602);
        assert_eq!(JsonRpcErrorCode::InternalError.code(), -32603);
        assert_eq!(JsonRpcErrorCode::ParseError.code(), -32700);
        assert_eq!(JsonRpcErrorCode::ApplicationError(-32001).code(), -32001);
    }

    #[test]
    fn encode_error_shape() {
        let bytes = encode_error(
            Some(&RequestId::Number(7)),
            JsonRpcErrorCode::MethodNotFound,
            "rpc method `nope` not found",
        );
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "error": {"code": -32601, "message": "rpc method `nope` not found"}
            })
        );
    }
}
