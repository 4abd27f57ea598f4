//! Connection lifecycle tracking
//!
//! The state machine is owned by one [`ConnectionManager`] per client and is
//! mutated only from transport events and explicit connect/disconnect calls.
//!
//! ```text
//! Disconnected --connect()--> Connecting --opened--> Connected
//!       ^                         |  ^                   |
//!       |                  closed |  | timer             | closed
//!  disconnect()                   v  |                   v
//!   (any state)                Reconnecting <------------+
//!                                  |
//!                        give-up threshold
//!                                  v
//!                               Failed
//! ```
//!
//! `Failed` is terminal until an explicit reconnect request. The backoff
//! strategy resets to its minimum delay on every successful `Connected`
//! transition.

use crate::reconnect::ReconnectionStrategy;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Connection state of the one active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to be.
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// Connected and operational.
    Connected,
    /// Connection lost; waiting out the backoff delay before redialing.
    Reconnecting { attempt: u32 },
    /// Reconnection abandoned; terminal until an explicit reconnect.
    Failed,
}

/// Owns the connection state and the reconnection schedule.
pub struct ConnectionManager {
    state: Arc<RwLock<ConnectionState>>,
    strategy: Arc<RwLock<Box<dyn ReconnectionStrategy>>>,
    url: String,
}

impl ConnectionManager {
    pub fn new(url: String, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            strategy: Arc::new(RwLock::new(strategy)),
            url,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != new_state {
            tracing::debug!(from = ?*state, to = ?new_state, "connection state transition");
            *state = new_state;
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A dial is starting.
    pub async fn connecting(&self) {
        self.set_state(ConnectionState::Connecting).await;
    }

    /// The transport reported an open connection. Resets the backoff.
    pub async fn connected(&self) {
        self.set_state(ConnectionState::Connected).await;
        self.strategy.write().await.reset();
    }

    /// Explicit user disconnect; any state may transition here.
    pub async fn disconnected(&self) {
        self.set_state(ConnectionState::Disconnected).await;
    }

    /// The transport reported a close; begin the reconnection schedule.
    pub async fn start_reconnecting(&self) {
        self.set_state(ConnectionState::Reconnecting { attempt: 0 }).await;
    }

    /// A redial failed; drop back to `Reconnecting` keeping the attempt
    /// count so the backoff keeps growing.
    pub async fn dial_failed(&self, attempt: u32) {
        self.set_state(ConnectionState::Reconnecting { attempt }).await;
    }

    /// Delay before the next dial, or `None` once the strategy gives up
    /// (which also moves the state to `Failed`).
    pub async fn next_reconnect_delay(&self) -> Option<std::time::Duration> {
        let attempt = match self.state().await {
            ConnectionState::Reconnecting { attempt } => attempt,
            _ => 0,
        };

        let delay = self.strategy.write().await.next_delay(attempt);

        match delay {
            Some(_) => {
                self.set_state(ConnectionState::Reconnecting { attempt: attempt + 1 })
                    .await;
            }
            None => {
                self.set_state(ConnectionState::Failed).await;
            }
        }

        delay
    }
}
