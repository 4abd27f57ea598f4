//! Moonraker Kit - async Moonraker client for Rust
//!
//! This is the main convenience crate that re-exports the moonraker-kit
//! sub-crates. Use this crate if you want a single dependency covering the
//! wire protocol and the client.
//!
//! # Architecture
//!
//! Moonraker Kit is organized into modular crates:
//!
//! - **moonraker-core**: Wire types, codec, error taxonomy
//! - **moonraker-client**: WebSocket JSON-RPC client with reconnection and
//!   the typed printer API
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use moonraker_kit::{MoonrakerApi, MoonrakerClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MoonrakerClient::connect("ws://localhost:7125/websocket").await?;
//!
//!     let api = MoonrakerApi::new(client.clone());
//!     if api.printer_ready().await? {
//!         api.home_axes("").await?;
//!     }
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates under stable module names
pub use moonraker_client as client;
pub use moonraker_core as core;

// Convenience re-exports of the most commonly used types
pub use moonraker_client::{ClientBuilder, MoonrakerApi, MoonrakerClient};
pub use moonraker_core::{ErrorKind, MoonrakerError, Result};
