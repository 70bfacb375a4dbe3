//! RPC wire types.
//!
//! Each frame is a 4-byte big-endian length followed by one JSON document.
//!
//! ```text
//! request:  {"id": 7, "method": "health.Check", "payload": {...}}
//! response: {"id": 7, "result": {...}}
//!           {"id": 7, "error": {"code": "UNIMPLEMENTED", "message": "..."}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest frame either side will accept.
pub const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// One RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Caller-chosen id echoed in the response.
    pub id: u64,

    /// Fully qualified method name, `module.Method`.
    pub method: String,

    #[serde(default)]
    pub payload: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            method: method.into(),
            payload,
        }
    }
}

/// The reply to one [`RpcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcStatus>,
}

impl RpcResponse {
    pub fn from_result(id: u64, result: Result<Value, RpcStatus>) -> Self {
        match result {
            Ok(value) => Self {
                id,
                result: Some(value),
                error: None,
            },
            Err(status) => Self {
                id,
                result: None,
                error: Some(status),
            },
        }
    }

    pub fn into_result(self) -> Result<Value, RpcStatus> {
        match self.error {
            Some(status) => Err(status),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Status codes carried by failed calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    InvalidArgument,
    NotFound,
    Unimplemented,
    Internal,
    Unavailable,
    Unknown,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::NotFound => "NOT_FOUND",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured RPC error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    pub code: Code,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn unimplemented(method: &str) -> Self {
        Self::new(Code::Unimplemented, format!("unknown method {}", method))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}
