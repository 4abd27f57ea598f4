//! Core protocol types for talking to a Moonraker daemon
//!
//! Moonraker speaks JSON-RPC 2.0 over a persistent WebSocket. This crate
//! holds everything that is pure data: the wire envelopes, the frame codec,
//! and the error taxonomy every failure is translated into before it reaches
//! caller code. The connection machinery lives in `moonraker-client`.

pub mod codec;
pub mod error;
pub mod types;

pub use error::{ErrorKind, MoonrakerError, Result, RpcErrorData};
pub use types::{notify, RpcFrame, RpcNotification, RpcRequest, RpcResponse};
