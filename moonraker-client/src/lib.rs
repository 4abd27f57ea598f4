//! Async Moonraker client over WebSocket JSON-RPC 2.0
//!
//! This crate provides the protocol layer for talking to a Moonraker 3D
//! printer daemon: a persistent WebSocket session speaking JSON-RPC 2.0,
//! with request/response correlation, server-push notification routing,
//! automatic reconnection, and a typed printer API on top.
//!
//! # Core Features
//!
//! - **Request-Response**: Correlated requests with per-request deadlines
//! - **Notifications**: Fan-out of server-push events (`notify_*` methods)
//! - **Auto-Reconnection**: Exponential backoff, resumed on connection loss
//! - **Keepalive**: Ping/pong watchdog that detects half-dead connections
//! - **Printer API**: Typed file, job, motion, temperature, and system ops
//! - **Observability**: OpenTelemetry metrics for client health
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use moonraker_client::{MoonrakerApi, MoonrakerClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MoonrakerClient::connect("ws://localhost:7125/websocket").await?;
//!
//!     client
//!         .subscribe_method("notify_status_update", "main", |notification| async move {
//!             println!("status: {:?}", notification.params);
//!         })
//!         .await;
//!
//!     let api = MoonrakerApi::new(client);
//!     let files = api.list_files("gcodes", None, false).await?;
//!     println!("{} files", files.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # With Reconnection Tuning
//!
//! ```rust,no_run
//! use moonraker_client::{ClientBuilder, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn example() -> moonraker_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:7125/websocket")
//!     .with_reconnect(Box::new(
//!         ExponentialBackoff::new(
//!             Duration::from_millis(200),
//!             Duration::from_secs(2)
//!         )
//!         .with_jitter()
//!     ))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod api;
mod client;
mod client_builder;
mod connection_state;
mod metrics;
mod notification;
mod reconnect;
mod request;

pub use api::{FileInfo, FileMetadata, MoonrakerApi, Thumbnail};
pub use client::{ConnectionCallback, MoonrakerClient};
pub use client_builder::ClientBuilder;
pub use connection_state::{ConnectionManager, ConnectionState};
pub use metrics::ClientMetrics;
pub use notification::{NotificationFn, NotificationRouter};
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
