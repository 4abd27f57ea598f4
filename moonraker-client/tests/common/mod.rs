//! Common test utilities for moonraker-client integration tests
//!
//! Provides a mock Moonraker daemon: a WebSocket server that answers
//! JSON-RPC requests through a handler function and can push notifications
//! or drop its connections on demand.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Clone)]
enum Push {
    Frame(String),
    Close,
}

/// Mock Moonraker daemon for client testing
pub struct MockMoonraker {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    push_tx: broadcast::Sender<Push>,
    message_rx: Option<mpsc::Receiver<String>>,
}

#[allow(dead_code)]
impl MockMoonraker {
    /// Start a mock daemon that acknowledges every request with an empty
    /// object result.
    pub async fn new() -> Self {
        Self::with_handler(|msg| async move {
            Some(mock_response(request_id(&msg), serde_json::json!({})))
        })
        .await
    }

    /// Start a mock daemon with a custom request handler. The handler sees
    /// each inbound text frame and may return a frame to send back.
    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Option<String>> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (push_tx, _) = broadcast::channel::<Push>(32);
        let (msg_tx, msg_rx) = mpsc::channel::<String>(100);

        let handler = Arc::new(handler);
        let accept_push_tx = push_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accept_result = listener.accept() => {
                        let Ok((stream, _)) = accept_result else { break };
                        let handler = handler.clone();
                        let msg_tx = msg_tx.clone();
                        let mut push_rx = accept_push_tx.subscribe();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            loop {
                                tokio::select! {
                                    msg = read.next() => {
                                        match msg {
                                            Some(Ok(Message::Text(text))) => {
                                                let _ = msg_tx.send(text.clone()).await;
                                                if let Some(response) = handler(text).await {
                                                    let _ = write.send(Message::Text(response)).await;
                                                }
                                            }
                                            Some(Ok(Message::Ping(payload))) => {
                                                let _ = write.send(Message::Pong(payload)).await;
                                            }
                                            Some(Ok(Message::Close(_))) => break,
                                            Some(Ok(_)) => {}
                                            _ => break,
                                        }
                                    }
                                    push = push_rx.recv() => {
                                        match push {
                                            Ok(Push::Frame(text)) => {
                                                let _ = write.send(Message::Text(text)).await;
                                            }
                                            Ok(Push::Close) => {
                                                let _ = write.send(Message::Close(None)).await;
                                                break;
                                            }
                                            Err(_) => {}
                                        }
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        // Let the accept loop come up before tests dial in.
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Self {
            addr,
            shutdown_tx,
            push_tx,
            message_rx: Some(msg_rx),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/websocket", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Push a frame to every connected client.
    pub fn push(&self, frame: String) {
        let _ = self.push_tx.send(Push::Frame(frame));
    }

    /// Close every active connection. The listener stays up, so clients
    /// with reconnection enabled can dial back in.
    pub fn drop_connections(&self) {
        let _ = self.push_tx.send(Push::Close);
    }

    /// Wait for the next request frame the daemon received.
    pub async fn wait_for_message(&mut self) -> Option<String> {
        let rx = self.message_rx.as_mut()?;
        tokio::time::timeout(tokio::time::Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.push_tx.send(Push::Close);
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}

/// Correlation id of a serialized request frame.
#[allow(dead_code)]
pub fn request_id(text: &str) -> u64 {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("id").and_then(|id| id.as_u64()))
        .unwrap_or(0)
}

#[allow(dead_code)]
pub fn mock_response(id: u64, result: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
    .to_string()
}

#[allow(dead_code)]
pub fn mock_error_response(id: u64, code: i32, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message
        },
        "id": id
    })
    .to_string()
}

#[allow(dead_code)]
pub fn mock_notification(method: &str, params: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
    .to_string()
}
