//! JSON-RPC 2.0 envelopes as Moonraker uses them
//!
//! Moonraker correlates requests and responses with plain integer ids and
//! pushes unsolicited state through notifications (method, no id). Unlike
//! the general JSON-RPC spec there is no batching and no string ids, so the
//! envelopes here commit to `u64` correlation ids.
//!
//! # Frame classification
//!
//! An inbound frame is classified by shape:
//!
//! - has `id` → [`RpcResponse`], routed to the request registry
//! - has `method` but no `id` → [`RpcNotification`], routed to subscribers
//! - neither → malformed, logged and dropped by the codec

use crate::error::RpcErrorData;
use serde::{Deserialize, Serialize};

/// Well-known notification method names pushed by Moonraker.
pub mod notify {
    /// Printer status objects changed.
    pub const STATUS_UPDATE: &str = "notify_status_update";
    /// The remote file listing changed.
    pub const FILELIST_CHANGED: &str = "notify_filelist_changed";
    /// Klipper disconnected from the daemon; treated like a lost connection.
    pub const KLIPPY_DISCONNECTED: &str = "notify_klippy_disconnected";
    /// Klipper is ready again; treated like a fresh successful connection.
    pub const KLIPPY_READY: &str = "notify_klippy_ready";
}

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

/// An outgoing JSON-RPC 2.0 request
///
/// Every request carries `"jsonrpc":"2.0"` and a `u64` id allocated by the
/// request registry. `params` is omitted from the wire when `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    /// Moonraker method, e.g. `printer.gcode.script`.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Correlation id, monotonically increasing per connection lifetime.
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A server-pushed notification (no correlation id, no reply expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNotification {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A response to an earlier request
///
/// Exactly one of `result`/`error` is populated. Moonraker omits `result`
/// for a handful of fire-and-forget style methods; the client substitutes
/// `Value::Null` rather than treating that as a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorData>,
    pub id: u64,
}

impl RpcResponse {
    pub fn success(result: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(error: RpcErrorData, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Any inbound frame the client knows how to route
#[derive(Debug, Clone)]
pub enum RpcFrame {
    Response(RpcResponse),
    Notification(RpcNotification),
}

impl RpcFrame {
    pub fn is_response(&self) -> bool {
        matches!(self, RpcFrame::Response(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, RpcFrame::Notification(_))
    }
}
