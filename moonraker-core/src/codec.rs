//! Frame codec for the Moonraker WebSocket connection
//!
//! Encoding is plain serde; decoding classifies a frame by shape before
//! committing to a type, because Moonraker interleaves responses (carry an
//! `id`) and notifications (carry a `method`, no `id`) on the same socket.
//!
//! Malformed top-level frames must never take down the receive loop: the
//! decoder reports them as a `ParseError` and the caller logs and drops.

use crate::error::{MoonrakerError, Result};
use crate::types::{RpcFrame, RpcNotification, RpcRequest, RpcResponse};
use serde::Serialize;

/// Encode any serializable envelope to its wire string.
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg)
        .map_err(|e| MoonrakerError::parse("encode", format!("serialization failed: {e}")))
}

/// Encode an outgoing request.
pub fn encode_request(request: &RpcRequest) -> Result<String> {
    encode(request)
}

/// Decode an inbound frame and classify it
///
/// Returns a [`ParseError`](crate::ErrorKind::ParseError) for frames that
/// are not valid JSON, are not objects, or carry neither an `id` nor a
/// `method`. Such errors are attributable to no pending request; callers
/// log them and drop the frame.
pub fn decode(data: &str) -> Result<RpcFrame> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| MoonrakerError::parse("decode", format!("invalid JSON frame: {e}")))?;

    if !value.is_object() {
        return Err(MoonrakerError::parse("decode", "frame is not a JSON object"));
    }

    if value.get("id").is_some() {
        let response: RpcResponse = serde_json::from_value(value)
            .map_err(|e| MoonrakerError::parse("decode", format!("malformed response: {e}")))?;
        return Ok(RpcFrame::Response(response));
    }

    if value.get("method").is_some() {
        let notification: RpcNotification = serde_json::from_value(value)
            .map_err(|e| MoonrakerError::parse("decode", format!("malformed notification: {e}")))?;
        return Ok(RpcFrame::Notification(notification));
    }

    Err(MoonrakerError::parse(
        "decode",
        "frame has neither id nor method",
    ))
}
