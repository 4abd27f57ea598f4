//! Builder for configuring and connecting a [`MoonrakerClient`]

use crate::client::{ConnectionCallback, ConnectionCallbacks, MoonrakerClient};
use crate::connection_state::ConnectionManager;
use crate::notification::NotificationRouter;
use crate::reconnect::{ExponentialBackoff, NoReconnect, ReconnectionStrategy};
use crate::request::RequestRegistry;
use crate::ClientMetrics;
use futures::StreamExt;
use moonraker_core::{notify, MoonrakerError, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_tungstenite::connect_async;

/// Minimum accepted request timeout; anything shorter cannot be enforced
/// meaningfully by the sweep granularity.
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(40);

const SWEEP_MIN: Duration = Duration::from_millis(10);
const SWEEP_MAX: Duration = Duration::from_millis(250);

/// Builder for [`MoonrakerClient`]
///
/// ```no_run
/// # use moonraker_client::MoonrakerClient;
/// # use std::time::Duration;
/// # async fn example() -> moonraker_core::Result<()> {
/// let client = MoonrakerClient::builder("ws://localhost:7125/websocket")
///     .request_timeout(Duration::from_secs(10))
///     .on_disconnected(|| tracing::warn!("printer offline"))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    url: String,
    request_timeout: Duration,
    keepalive_interval: Duration,
    reconnect: bool,
    strategy: Option<Box<dyn ReconnectionStrategy>>,
    on_connected: Option<ConnectionCallback>,
    on_disconnected: Option<ConnectionCallback>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ClientBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(10),
            reconnect: true,
            strategy: None,
            on_connected: None,
            on_disconnected: None,
            metrics: None,
        }
    }

    /// Per-request deadline. Applies to every request sent by the client.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Interval between keepalive pings. A pong missing for longer than
    /// twice this interval closes the connection.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Use a custom reconnection strategy (implies reconnection enabled).
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect = true;
        self.strategy = Some(strategy);
        self
    }

    /// Reconnect with the stock backoff (200 ms to 2 s, 2x). This is the
    /// default; the call exists to make the choice explicit.
    pub fn with_default_reconnect(mut self) -> Self {
        self.reconnect = true;
        self.strategy = None;
        self
    }

    /// Disable reconnection: a lost connection moves straight to `Failed`
    /// and the initial dial does not retry.
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = false;
        self.strategy = None;
        self
    }

    /// Invoked after every successful connection, initial and re-dials
    /// alike, and when Klipper reports ready.
    pub fn on_connected<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_connected = Some(Arc::new(callback));
        self
    }

    /// Invoked when the connection drops and when Klipper disconnects from
    /// Moonraker while the socket stays up.
    pub fn on_disconnected<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_disconnected = Some(Arc::new(callback));
        self
    }

    /// Record client health through the OpenTelemetry global meter.
    pub fn with_metrics(mut self, service_name: impl Into<String>) -> Self {
        self.metrics = Some(Arc::new(ClientMetrics::new(service_name)));
        self
    }

    /// Dial the daemon and spawn the session tasks.
    ///
    /// With reconnection enabled the initial dial walks the same backoff
    /// schedule as a dropped connection; with it disabled a failed dial is
    /// terminal (`Failed`).
    pub async fn connect(self) -> Result<MoonrakerClient> {
        if self.request_timeout < MIN_REQUEST_TIMEOUT {
            return Err(MoonrakerError::validation(
                "connect",
                format!(
                    "request timeout below minimum of {} ms",
                    MIN_REQUEST_TIMEOUT.as_millis()
                ),
            ));
        }

        let strategy: Box<dyn ReconnectionStrategy> = if self.reconnect {
            self.strategy
                .unwrap_or_else(|| Box::new(ExponentialBackoff::default()))
        } else {
            Box::new(NoReconnect)
        };
        let connection = Arc::new(ConnectionManager::new(self.url.clone(), strategy));

        connection.connecting().await;
        let mut attempt = 0u32;
        let ws_stream = loop {
            match connect_async(&self.url).await {
                Ok((ws_stream, _)) => break ws_stream,
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "connection failed");
                    connection.dial_failed(attempt).await;
                    match connection.next_reconnect_delay().await {
                        Some(delay) => {
                            attempt += 1;
                            tokio::time::sleep(delay).await;
                            connection.connecting().await;
                        }
                        None => {
                            return Err(MoonrakerError::connection_lost(
                                "connect",
                                format!("failed to connect to {}: {e}", self.url),
                            ));
                        }
                    }
                }
            }
        };

        tracing::info!(url = %self.url, "connected");
        let (sender, receiver) = ws_stream.split();
        connection.connected().await;

        let callbacks = ConnectionCallbacks {
            on_connected: self.on_connected,
            on_disconnected: self.on_disconnected,
        };

        let client = MoonrakerClient {
            sender: Arc::new(Mutex::new(sender)),
            registry: RequestRegistry::new(),
            router: NotificationRouter::new(),
            connection,
            request_timeout: self.request_timeout,
            shutdown: Arc::new(AtomicBool::new(false)),
            last_pong: Arc::new(Mutex::new(Instant::now())),
            callbacks,
            metrics: self.metrics,
        };

        if let Some(metrics) = &client.metrics {
            metrics.update_connection_state(2);
        }
        client.callbacks.connected();
        register_klippy_policy(&client).await;

        let sweep_interval = (client.request_timeout / 4).clamp(SWEEP_MIN, SWEEP_MAX);
        tokio::spawn(client.clone().receive_loop(receiver));
        tokio::spawn(client.clone().heartbeat_loop(self.keepalive_interval));
        tokio::spawn(client.clone().sweep_loop(sweep_interval));

        Ok(client)
    }
}

/// Klipper lifecycle notifications drive the same callbacks as transport
/// events. These are ordinary method subscriptions under a reserved handler
/// name; application code may subscribe to the same methods independently.
async fn register_klippy_policy(client: &MoonrakerClient) {
    let callbacks = client.callbacks.clone();
    client
        .router
        .register_method(notify::KLIPPY_DISCONNECTED, "klippy_policy", move |_| {
            let callbacks = callbacks.clone();
            async move {
                tracing::warn!("Klipper disconnected from Moonraker");
                callbacks.disconnected();
            }
        })
        .await;

    let callbacks = client.callbacks.clone();
    client
        .router
        .register_method(notify::KLIPPY_READY, "klippy_policy", move |_| {
            let callbacks = callbacks.clone();
            async move {
                tracing::info!("Klipper ready");
                callbacks.connected();
            }
        })
        .await;
}
