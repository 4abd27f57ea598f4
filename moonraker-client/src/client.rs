//! The Moonraker client session
//!
//! One [`MoonrakerClient`] owns one logical WebSocket connection to the
//! daemon plus all the protocol-layer state: the request registry, the
//! notification router, and the connection state machine. The client is
//! cheaply cloneable (`Arc` internally); all clones share the same session.
//!
//! Inbound frames are classified in one place: frames with an `id` go to
//! the request registry, frames with a `method` go to the notification
//! router, anything else is logged and dropped. The receive loop also owns
//! reconnection: on a lost connection it purges every pending request with
//! `ConnectionLost`, then walks the backoff schedule until a dial succeeds
//! or the strategy gives up.
//!
//! Two Moonraker notifications get hard-wired policy at connect time:
//! `notify_klippy_disconnected` drives the same callback path as a lost
//! connection, and `notify_klippy_ready` the same path as a fresh
//! connection. They are plain subscriptions, not special routing.

use crate::connection_state::{ConnectionManager, ConnectionState};
use crate::notification::NotificationRouter;
use crate::request::RequestRegistry;
use crate::ClientBuilder;
use futures::{SinkExt, StreamExt};
use moonraker_core::{codec, MoonrakerError, Result, RpcFrame, RpcNotification, RpcRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub(crate) type WsSink = futures::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
pub(crate) type WsStream =
    futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Callback invoked on connection-level events. Runs inside the protocol
/// event loop; anything that must happen on another thread (a UI update)
/// has to be handed off by the callback itself.
pub type ConnectionCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct ConnectionCallbacks {
    pub(crate) on_connected: Option<ConnectionCallback>,
    pub(crate) on_disconnected: Option<ConnectionCallback>,
}

impl ConnectionCallbacks {
    pub(crate) fn connected(&self) {
        if let Some(cb) = &self.on_connected {
            cb();
        }
    }

    pub(crate) fn disconnected(&self) {
        if let Some(cb) = &self.on_disconnected {
            cb();
        }
    }
}

/// Async Moonraker JSON-RPC client over WebSocket
#[derive(Clone)]
pub struct MoonrakerClient {
    pub(crate) sender: Arc<Mutex<WsSink>>,
    pub(crate) registry: RequestRegistry,
    pub(crate) router: NotificationRouter,
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) request_timeout: Duration,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) last_pong: Arc<Mutex<Instant>>,
    pub(crate) callbacks: ConnectionCallbacks,
    pub(crate) metrics: Option<Arc<crate::ClientMetrics>>,
}

// The split sink has no Debug impl, so derive is out.
impl std::fmt::Debug for MoonrakerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoonrakerClient")
            .field("url", &self.connection.url())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl MoonrakerClient {
    /// Connect with default settings (auto-reconnect, 10 s keepalive).
    /// Use [`MoonrakerClient::builder`] to configure anything.
    pub async fn connect(url: &str) -> Result<Self> {
        ClientBuilder::new(url).connect().await
    }

    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub async fn is_connected(&self) -> bool {
        matches!(self.connection.state().await, ConnectionState::Connected)
    }

    /// Send a request and await its result
    ///
    /// Fails fast with `ConnectionLost` when not connected; otherwise the
    /// request is tracked in the registry and resolves exactly once: with
    /// the result value, a `ProtocolError` from the peer, `Timeout` at the
    /// deadline, or `ConnectionLost` if the transport drops first.
    #[tracing::instrument(skip(self, params), fields(method = %method.as_ref()))]
    pub async fn request(
        &self,
        method: impl Into<String> + AsRef<str>,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let method = method.into();
        let start = std::time::Instant::now();

        if !self.is_connected().await {
            return Err(MoonrakerError::connection_lost(method.as_str(), "not connected"));
        }

        let id = self.registry.next_id();
        let deadline = Instant::now() + self.request_timeout;
        let rx = self.registry.register(id, method.as_str(), deadline).await;

        let request = RpcRequest::new(method.clone(), params, id);
        let text = codec::encode_request(&request)?;
        tracing::debug!(id, "sending request");

        if let Err(e) = self.sender.lock().await.send(Message::Text(text)).await {
            let error = MoonrakerError::connection_lost(method.as_str(), format!("send failed: {e}"));
            self.registry.fail(id, error.clone()).await;
            return Err(error);
        }

        let outcome = rx
            .await
            .map_err(|_| MoonrakerError::connection_lost(method.as_str(), "client shut down"))?;

        if let Some(metrics) = &self.metrics {
            let status = if outcome.is_ok() { "success" } else { "error" };
            metrics.record_request(&method, status, start.elapsed().as_secs_f64());
            if let Err(err) = &outcome {
                metrics.record_error(&err.kind.to_string());
            }
        }
        outcome
    }

    /// Send a request without waiting for the reply
    ///
    /// The envelope still carries a correlation id (Moonraker answers every
    /// request); the reply takes the unknown-id drop path in the registry.
    pub async fn send_fire_and_forget(
        &self,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let method = method.into();
        if !self.is_connected().await {
            return Err(MoonrakerError::connection_lost(method.as_str(), "not connected"));
        }

        let request = RpcRequest::new(method, params, self.registry.next_id());
        let text = codec::encode_request(&request)?;
        tracing::debug!(method = %request.method, id = request.id, "sending fire-and-forget");

        self.sender
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| {
                MoonrakerError::connection_lost(&request.method, format!("send failed: {e}"))
            })
    }

    /// Subscribe to every notification the daemon pushes.
    pub async fn subscribe_all<F, Fut>(&self, callback: F)
    where
        F: Fn(RpcNotification) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.router.register_general(callback).await;
    }

    /// Subscribe to one notification method under a handler name.
    /// Re-subscribing the same `(method, handler_name)` replaces the
    /// previous callback.
    pub async fn subscribe_method<F, Fut>(
        &self,
        method: impl Into<String>,
        handler_name: impl Into<String>,
        callback: F,
    ) where
        F: Fn(RpcNotification) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.router.register_method(method, handler_name, callback).await;
    }

    pub async fn unsubscribe_method(&self, method: &str, handler_name: &str) -> bool {
        self.router.unregister_method(method, handler_name).await
    }

    /// Tear the session down. Pending requests fail with `ConnectionLost`,
    /// the state machine moves to `Disconnected`, and no reconnection is
    /// attempted.
    pub async fn disconnect(&self) {
        tracing::info!(pending = self.registry.pending_count().await, "disconnecting");
        self.shutdown.store(true, Ordering::SeqCst);
        self.registry.purge_all("client disconnect").await;
        self.connection.disconnected().await;
        if let Some(metrics) = &self.metrics {
            metrics.update_connection_state(0);
        }
        let _ = self.sender.lock().await.send(Message::Close(None)).await;
    }

    /// Receive loop: drains inbound frames until the connection drops, then
    /// runs the reconnection schedule. Spawned once per client by the
    /// builder.
    pub(crate) async fn receive_loop(self, mut receiver: WsStream) {
        loop {
            while let Some(message) = receiver.next().await {
                if self.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                match message {
                    Ok(Message::Text(text)) => self.handle_frame(&text).await,
                    Ok(Message::Pong(_)) => {
                        *self.last_pong.lock().await = Instant::now();
                    }
                    Ok(Message::Close(_)) => {
                        tracing::warn!("connection closed by peer");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "websocket error");
                        if let Some(metrics) = &self.metrics {
                            metrics.record_error("websocket");
                        }
                        break;
                    }
                    _ => {}
                }
            }

            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }

            // Connection lost: purge first so no caller waits on a dead
            // socket, then notify and start the backoff schedule.
            self.registry.purge_all("connection lost").await;
            self.callbacks.disconnected();
            self.connection.start_reconnecting().await;
            if let Some(metrics) = &self.metrics {
                metrics.update_connection_state(3);
            }

            match self.reconnect().await {
                Some(new_receiver) => {
                    receiver = new_receiver;
                }
                None => {
                    // Failed is terminal; nothing left to drive.
                    return;
                }
            }
        }
    }

    /// Walk the backoff schedule until a dial succeeds or the strategy
    /// gives up. Returns the new read half on success.
    async fn reconnect(&self) -> Option<WsStream> {
        loop {
            let attempt = match self.connection.state().await {
                ConnectionState::Reconnecting { attempt } => attempt,
                _ => 0,
            };
            let Some(delay) = self.connection.next_reconnect_delay().await else {
                tracing::error!("reconnection abandoned");
                self.registry.purge_all("reconnection abandoned").await;
                if let Some(metrics) = &self.metrics {
                    metrics.update_connection_state(4);
                }
                return None;
            };

            tracing::info!(delay_ms = delay.as_millis() as u64, attempt, "reconnecting");
            if let Some(metrics) = &self.metrics {
                metrics.record_reconnection_attempt();
            }
            tokio::time::sleep(delay).await;
            if self.shutdown.load(Ordering::SeqCst) {
                return None;
            }

            self.connection.connecting().await;
            match connect_async(self.connection.url()).await {
                Ok((ws_stream, _)) => {
                    tracing::info!("reconnected");
                    let (new_sender, new_receiver) = ws_stream.split();
                    *self.sender.lock().await = new_sender;
                    *self.last_pong.lock().await = Instant::now();
                    self.connection.connected().await;
                    if let Some(metrics) = &self.metrics {
                        metrics.update_connection_state(2);
                        metrics.record_reconnection_success();
                    }
                    self.callbacks.connected();
                    return Some(new_receiver);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reconnection attempt failed");
                    self.connection.dial_failed(attempt + 1).await;
                }
            }
        }
    }

    async fn handle_frame(&self, text: &str) {
        match codec::decode(text) {
            Ok(RpcFrame::Response(response)) => {
                self.registry.resolve(response).await;
            }
            Ok(RpcFrame::Notification(notification)) => {
                tracing::debug!(method = %notification.method, "notification received");
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification(&notification.method);
                }
                self.router.dispatch(notification).await;
            }
            Err(e) => {
                // Malformed top-level frames are dropped, never fatal.
                tracing::warn!(error = %e, "dropping malformed frame");
                if let Some(metrics) = &self.metrics {
                    metrics.record_error("parse");
                }
            }
        }
    }

    /// Keepalive watchdog: a ping every `interval`, and a missing pong for
    /// longer than twice that closes the connection so the receive loop
    /// takes the reconnection path.
    pub(crate) async fn heartbeat_loop(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if !matches!(self.connection.state().await, ConnectionState::Connected) {
                continue;
            }

            let stale = pong_is_stale(*self.last_pong.lock().await, Instant::now(), interval);
            if stale {
                tracing::warn!("keepalive: no pong within tolerance, closing connection");
                let _ = self.sender.lock().await.send(Message::Close(None)).await;
                continue;
            }

            if let Err(e) = self.sender.lock().await.send(Message::Ping(Vec::new())).await {
                tracing::debug!(error = %e, "keepalive ping failed");
            }
        }
    }

    /// Timeout sweep: cooperative, driven by the client's interval timer.
    /// The builder derives `interval` strictly below the request timeout.
    pub(crate) async fn sweep_loop(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            self.registry.sweep(Instant::now()).await;
        }
    }
}

/// The pong tolerance is twice the ping interval; anything older means the
/// peer stopped acknowledging and the connection is treated as closed.
fn pong_is_stale(last_pong: Instant, now: Instant, interval: Duration) -> bool {
    now.duration_since(last_pong) > interval * 2
}
