//! Reconnection integration tests
//!
//! Automatic redial after a dropped connection, backoff behavior, and the
//! no-reconnect failure path.

mod common;

use common::MockMoonraker;
use moonraker_client::{ClientBuilder, ConnectionState, ExponentialBackoff, MoonrakerClient};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn reconnects_after_connection_drop() {
    let server = MockMoonraker::new().await;

    let connected = Arc::new(AtomicUsize::new(0));
    let connected_clone = connected.clone();

    let client = ClientBuilder::new(&server.url())
        .with_reconnect(Box::new(ExponentialBackoff::new(
            Duration::from_millis(50),
            Duration::from_millis(200),
        )))
        .on_connected(move || {
            connected_clone.fetch_add(1, Ordering::SeqCst);
        })
        .connect()
        .await
        .unwrap();

    assert!(client.is_connected().await);
    assert_eq!(connected.load(Ordering::SeqCst), 1);

    // The listener stays up, so the redial succeeds.
    server.drop_connections();

    let mut reconnected = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if connected.load(Ordering::SeqCst) >= 2 && client.is_connected().await {
            reconnected = true;
            break;
        }
    }
    assert!(reconnected, "client should have redialed the mock daemon");

    // The session is usable again.
    let result = client.request("printer.info", None).await;
    assert!(result.is_ok());

    client.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn without_reconnect_drop_is_terminal() {
    let server = MockMoonraker::new().await;

    let client = ClientBuilder::new(&server.url())
        .without_reconnect()
        .connect()
        .await
        .unwrap();

    assert!(client.is_connected().await);

    server.drop_connections();

    let mut failed = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if client.connection_state().await == ConnectionState::Failed {
            failed = true;
            break;
        }
    }
    assert!(failed, "no-reconnect client should end in Failed");
    assert!(!client.is_connected().await);

    server.shutdown().await;
}

#[tokio::test]
async fn initial_dial_fails_without_reconnect() {
    // Nothing listens on this port.
    let err = ClientBuilder::new("ws://127.0.0.1:1/websocket")
        .without_reconnect()
        .connect()
        .await
        .unwrap_err();
    assert_eq!(err.kind, moonraker_core::ErrorKind::ConnectionLost);
}

#[tokio::test]
async fn initial_dial_retries_with_backoff() {
    let start = std::time::Instant::now();
    let err = ClientBuilder::new("ws://127.0.0.1:1/websocket")
        .with_reconnect(Box::new(
            ExponentialBackoff::new(Duration::from_millis(20), Duration::from_millis(40))
                .with_max_attempts(3),
        ))
        .connect()
        .await
        .unwrap_err();

    assert_eq!(err.kind, moonraker_core::ErrorKind::ConnectionLost);
    // Three scheduled delays of 20, 40, 40 ms must have elapsed.
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn reconnect_purges_pending_requests() {
    // Daemon that never answers, so the request stays pending.
    let server = MockMoonraker::with_handler(|_msg| async move { None }).await;

    let client = ClientBuilder::new(&server.url())
        .with_reconnect(Box::new(ExponentialBackoff::new(
            Duration::from_millis(50),
            Duration::from_millis(100),
        )))
        .request_timeout(Duration::from_secs(30))
        .connect()
        .await
        .unwrap();

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.request("printer.info", None).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.drop_connections();

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("reconnection must not leave requests hanging")
        .unwrap();
    assert_eq!(
        result.unwrap_err().kind,
        moonraker_core::ErrorKind::ConnectionLost
    );

    client.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn explicit_disconnect_stops_reconnection() {
    let server = MockMoonraker::new().await;

    let client = MoonrakerClient::connect(&server.url()).await.unwrap();
    assert!(client.is_connected().await);

    client.disconnect().await;
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);

    // Still disconnected after any backoff window would have elapsed.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);

    server.shutdown().await;
}
