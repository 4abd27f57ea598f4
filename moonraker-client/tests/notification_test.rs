//! Notification routing integration tests
//!
//! Server-push fan-out to general and per-method subscribers, replace
//! semantics, and the hard-wired Klipper lifecycle policy.

mod common;

use common::{mock_notification, MockMoonraker};
use moonraker_client::{ClientBuilder, MoonrakerClient};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn general_subscriber_sees_every_notification() {
    let server = MockMoonraker::new().await;
    let client = MoonrakerClient::connect(&server.url()).await.unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    client
        .subscribe_all(move |_notification| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

    server.push(mock_notification(
        "notify_status_update",
        serde_json::json!([{"print_stats": {"state": "printing"}}]),
    ));
    server.push(mock_notification(
        "notify_filelist_changed",
        serde_json::json!({"action": "create_file"}),
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);

    client.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn method_subscriber_filters_by_method() {
    let server = MockMoonraker::new().await;
    let client = MoonrakerClient::connect(&server.url()).await.unwrap();

    let status_count = Arc::new(AtomicUsize::new(0));
    let status_clone = status_count.clone();
    client
        .subscribe_method("notify_status_update", "status_panel", move |_n| {
            let count = status_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

    server.push(mock_notification(
        "notify_status_update",
        serde_json::json!([{}]),
    ));
    server.push(mock_notification(
        "notify_filelist_changed",
        serde_json::json!({}),
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(status_count.load(Ordering::SeqCst), 1);

    client.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn resubscribing_same_handler_name_replaces() {
    let server = MockMoonraker::new().await;
    let client = MoonrakerClient::connect(&server.url()).await.unwrap();

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let first_clone = first.clone();
    client
        .subscribe_method("notify_status_update", "panel", move |_n| {
            let count = first_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

    let second_clone = second.clone();
    client
        .subscribe_method("notify_status_update", "panel", move |_n| {
            let count = second_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

    server.push(mock_notification(
        "notify_status_update",
        serde_json::json!([{}]),
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    client.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let server = MockMoonraker::new().await;
    let client = MoonrakerClient::connect(&server.url()).await.unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    client
        .subscribe_method("notify_filelist_changed", "files_panel", move |_n| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

    assert!(client.unsubscribe_method("notify_filelist_changed", "files_panel").await);

    server.push(mock_notification(
        "notify_filelist_changed",
        serde_json::json!({}),
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    client.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn klippy_lifecycle_drives_connection_callbacks() {
    let server = MockMoonraker::new().await;

    let connected = Arc::new(AtomicUsize::new(0));
    let disconnected = Arc::new(AtomicUsize::new(0));
    let connected_clone = connected.clone();
    let disconnected_clone = disconnected.clone();

    let client = ClientBuilder::new(&server.url())
        .on_connected(move || {
            connected_clone.fetch_add(1, Ordering::SeqCst);
        })
        .on_disconnected(move || {
            disconnected_clone.fetch_add(1, Ordering::SeqCst);
        })
        .connect()
        .await
        .unwrap();

    // Once for the initial connection.
    assert_eq!(connected.load(Ordering::SeqCst), 1);

    server.push(mock_notification(
        "notify_klippy_disconnected",
        serde_json::json!({}),
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);
    // The socket itself stayed up.
    assert!(client.is_connected().await);

    server.push(mock_notification(
        "notify_klippy_ready",
        serde_json::json!({}),
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connected.load(Ordering::SeqCst), 2);

    client.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn panicking_subscriber_does_not_stop_others() {
    let server = MockMoonraker::new().await;
    let client = MoonrakerClient::connect(&server.url()).await.unwrap();

    let survivor = Arc::new(AtomicUsize::new(0));

    client
        .subscribe_method("notify_status_update", "bad", |_n| async move {
            panic!("handler bug");
        })
        .await;

    let survivor_clone = survivor.clone();
    client
        .subscribe_method("notify_status_update", "good", move |_n| {
            let count = survivor_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

    server.push(mock_notification(
        "notify_status_update",
        serde_json::json!([{}]),
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(survivor.load(Ordering::SeqCst), 1);

    client.disconnect().await;
    server.shutdown().await;
}
