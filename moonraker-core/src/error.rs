//! Error taxonomy for the Moonraker client
//!
//! Every failure a caller can observe, whether it started as a transport
//! drop, a JSON-RPC error object, an HTTP-style status code, or a local
//! precondition, is translated into one [`MoonrakerError`] before it crosses
//! the protocol-layer boundary. The constructors here are the translator:
//! pure functions from a failure source to a typed error, no state, no side
//! effects.
//!
//! # Taxonomy
//!
//! | Kind | Raised when |
//! |---|---|
//! | `Timeout` | No response before the request's deadline. |
//! | `ConnectionLost` | Transport closed with the request pending, or submit while disconnected. |
//! | `ProtocolError` | The response carries a JSON-RPC error object. |
//! | `ValidationError` | Parameters fail a precondition before transmission. |
//! | `ParseError` | An inbound payload is missing its expected shape. |
//! | `NotFound` | Peer reported 404 for an addressed resource. |
//! | `PermissionDenied` | Peer reported 403. |
//! | `Unknown` | Any other peer-reported failure. |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used throughout the workspace.
pub type Result<T> = std::result::Result<T, MoonrakerError>;

/// Substituted when a JSON-RPC error object arrives without a message.
const DEFAULT_ERROR_MESSAGE: &str = "unknown error";

/// Classification of a [`MoonrakerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    ConnectionLost,
    ProtocolError,
    ValidationError,
    ParseError,
    NotFound,
    PermissionDenied,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionLost => "connection lost",
            ErrorKind::ProtocolError => "protocol error",
            ErrorKind::ValidationError => "validation error",
            ErrorKind::ParseError => "parse error",
            ErrorKind::NotFound => "not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The one error type callers ever see
///
/// Created fresh for every failure and never mutated afterwards. `method`
/// names the RPC call the failure belongs to (or describes the failing
/// operation for failures with no request, e.g. the connection itself).
#[derive(Debug, Clone, Error)]
#[error("{kind} in {method}: {message} (code {code})")]
pub struct MoonrakerError {
    pub kind: ErrorKind,
    /// Peer-reported code: JSON-RPC error code or HTTP status, 0 otherwise.
    pub code: i32,
    /// RPC method the failure is attributed to, for diagnostics.
    pub method: String,
    pub message: String,
}

impl MoonrakerError {
    pub fn new(
        kind: ErrorKind,
        method: impl Into<String>,
        message: impl Into<String>,
        code: i32,
    ) -> Self {
        Self {
            kind,
            code,
            method: method.into(),
            message: message.into(),
        }
    }

    /// No response arrived before the request's deadline.
    pub fn timeout(method: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, method, "request timed out", 0)
    }

    /// The transport dropped, or a send was attempted while disconnected.
    pub fn connection_lost(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionLost, method, message, 0)
    }

    /// A parameter precondition failed before anything hit the wire.
    pub fn validation(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, method, message, 0)
    }

    /// An inbound payload was not shaped the way the caller expected.
    pub fn parse(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, method, message, 0)
    }

    /// Translate a JSON-RPC error object from a response payload
    ///
    /// Moonraker reuses HTTP status codes in its error objects (404 for a
    /// missing file, 403 for a denied path); those go through the status
    /// mapping. Negative codes are JSON-RPC protocol errors (-32601 and
    /// friends) and keep the `ProtocolError` kind.
    pub fn from_rpc_error(method: impl Into<String>, error: RpcErrorData) -> Self {
        let message = if error.message.is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            error.message
        };
        if (400..=599).contains(&error.code) {
            return Self::from_status(error.code, method, message);
        }
        Self::new(ErrorKind::ProtocolError, method, message, error.code)
    }

    /// Translate an HTTP-style status code reported by the peer.
    ///
    /// 404 maps to `NotFound`, 403 to `PermissionDenied`, anything else
    /// non-2xx to `Unknown`.
    pub fn from_status(status: i32, method: impl Into<String>, message: impl Into<String>) -> Self {
        let kind = match status {
            404 => ErrorKind::NotFound,
            403 => ErrorKind::PermissionDenied,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, method, message, status)
    }
}

/// JSON-RPC 2.0 error object as it appears on the wire
///
/// `message` is defaulted when absent; the translator substitutes a fixed
/// fallback text so callers never see an empty message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorData {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcErrorData {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for RpcErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
