//! # MCP Transport Layer
//!
//! Transports move JSON-RPC messages between the host and the server's
//! [`Protocol`](crate::protocol::Protocol). Two server transports are
//! provided:
//!
//! - [`ServerStdioTransport`]: newline-delimited JSON over stdin/stdout, the
//!   transport hosts use when they launch the server as a child process
//! - `ServerSseTransport` (feature `sse`): an HTTP server that streams
//!   responses over Server-Sent Events and accepts messages via POST

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod in_flight;
pub(crate) use in_flight::{InFlight, CANCELLED_METHOD};

mod stdio;
pub use stdio::ServerStdioTransport;

#[cfg(feature = "sse")]
mod sse;
#[cfg(feature = "sse")]
pub use sse::{message_handler, sse_handler, MessageQuery, ServerSseTransport};

/// A message in the MCP protocol.
pub type Message = JsonRpcMessage;

/// Core trait that defines operations for MCP server transports.
#[async_trait()]
pub trait Transport: Send + Sync + 'static {
    /// Opens the transport and serves messages until it is closed.
    async fn open(&self) -> Result<()>;

    /// Closes the transport connection.
    async fn close(&self) -> Result<()>;

    /// Polls for the next incoming message. `None` means the peer is gone.
    async fn poll_message(&self) -> Result<Option<Message>>;

    /// Sends a notification. Notifications do not expect a response.
    async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Sends a response to a request.
    async fn send_response(&self, response: JsonRpcResponse) -> Result<()>;
}

/// A JSON-RPC request id. Hosts may use numbers or strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl Default for RequestId {
    fn default() -> Self {
        RequestId::Number(0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(id) => write!(f, "{id}"),
            RequestId::String(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

/// Represents a JSON-RPC protocol version, always "2.0".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct JsonRpcVersion(String);

impl Default for JsonRpcVersion {
    fn default() -> Self {
        JsonRpcVersion("2.0".to_owned())
    }
}

impl JsonRpcVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Represents a JSON-RPC message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request that expects a response
    Request(JsonRpcRequest),
    /// A notification that does not expect a response
    Notification(JsonRpcNotification),
    /// A response to a request
    Response(JsonRpcResponse),
}

/// Represents a JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JsonRpcRequest {
    /// The request ID, used to match with the response
    pub id: RequestId,
    /// The method name to call
    pub method: String,
    /// Optional parameters for the method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// The JSON-RPC version
    #[serde(default)]
    pub jsonrpc: JsonRpcVersion,
}

/// Represents a JSON-RPC notification.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JsonRpcNotification {
    /// The method name for the notification
    pub method: String,
    /// Optional parameters for the notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// The JSON-RPC version
    #[serde(default)]
    pub jsonrpc: JsonRpcVersion,
}

/// Represents a JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JsonRpcResponse {
    /// The request ID this response corresponds to
    pub id: RequestId,
    /// The result of the request, if successful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// The error, if the request failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// The JSON-RPC version
    #[serde(default)]
    pub jsonrpc: JsonRpcVersion,
}

impl JsonRpcResponse {
    /// A successful response carrying `result`.
    pub fn success(id: RequestId, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
            jsonrpc: Default::default(),
        }
    }

    /// A failed response carrying `code` and `message`.
    pub fn failure(id: RequestId, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            jsonrpc: Default::default(),
        }
    }
}

/// Represents a JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_with_string_id() {
        let message: Message = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": "req-7",
            "method": "tools/list"
        }))
        .unwrap();

        match message {
            JsonRpcMessage::Request(request) => {
                assert_eq!(request.id, RequestId::String("req-7".to_string()));
                assert_eq!(request.method, "tools/list");
                assert!(request.params.is_none());
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_notification_has_no_id() {
        let message: Message = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();

        assert!(matches!(message, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn test_response_serialization_omits_empty_fields() {
        let response = JsonRpcResponse::success(RequestId::Number(3), json!({}));
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"id":3,"result":{},"jsonrpc":"2.0"}"#
        );
    }
}
