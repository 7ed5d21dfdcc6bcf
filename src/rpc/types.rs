//! Wire types for the line-delimited RPC protocol.
//!
//! Requests are `{id?, method, params?}`; responses take exactly one of the
//! shapes `{id, result}`, `{id}` or `{id, error:{code, message}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request id marking a notification: the handler runs, nothing is written back.
pub const NOTIFY_ID: i64 = -1;

/// Error code for an unregistered method.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Error code for a handler that failed while executing.
pub const HANDLER_FAILED: i32 = -1;

/// A decoded call: who asked, what to run, with which positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CallIntent {
    pub id: i64,
    pub method: String,
    pub args: Vec<Value>,
}

impl CallIntent {
    pub fn new(id: i64, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            args,
        }
    }

    /// Builds a notification, which never receives a reply.
    pub fn notification(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::new(NOTIFY_ID, method, args)
    }

    /// Returns true if no reply is expected for this call.
    pub fn is_notification(&self) -> bool {
        self.id == NOTIFY_ID
    }
}

/// Request as it appears on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct WireRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

impl From<WireRequest> for CallIntent {
    fn from(request: WireRequest) -> Self {
        CallIntent {
            id: request.id.unwrap_or(NOTIFY_ID),
            method: request.method,
            args: request.params.unwrap_or_default(),
        }
    }
}

/// A response frame.
///
/// `result` and `error` are never both populated; when neither is, the
/// response acknowledges a void call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Successful call with a return value.
    pub fn result(id: i64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Successful call of a handler declared as returning nothing.
    pub fn void(id: i64) -> Self {
        Self {
            id,
            result: None,
            error: None,
        }
    }

    /// Failed call.
    pub fn error(id: i64, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A call error reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Unknown method '{}'", method),
        }
    }

    /// Creates a handler failure error (-1).
    pub fn handler_failed(method: &str, reason: &str) -> Self {
        Self {
            code: HANDLER_FAILED,
            message: format!("Handler '{}' threw an exception: {}", method, reason),
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}
