//! Request correlation and timeout bookkeeping
//!
//! Every outgoing request gets a monotonic `u64` id and a pending entry
//! holding its method name, an absolute deadline, and the oneshot sender the
//! caller is awaiting. An entry is removed from the map in the same step
//! that its channel fires, so a request resolves exactly once: a late
//! response racing a timeout sweep finds the entry already gone and is
//! dropped with a warning.
//!
//! Callers never block; completion is always observed through the oneshot.
//! The timeout sweep is cooperative, driven by the client's own interval
//! timer rather than a dedicated thread.

use moonraker_core::{MoonrakerError, Result, RpcResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

/// One outstanding call awaiting a response.
struct PendingRequest {
    method: String,
    deadline: Instant,
    tx: oneshot::Sender<Result<serde_json::Value>>,
}

/// Tracks pending requests and enforces bounded wait times.
#[derive(Clone)]
pub struct RequestRegistry {
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    counter: Arc<AtomicU64>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Allocate the next correlation id. Ids are never reused within a
    /// client's lifetime, so duplicate submission cannot occur.
    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Store a pending entry and hand back the receiver the caller awaits.
    pub async fn register(
        &self,
        id: u64,
        method: impl Into<String>,
        deadline: Instant,
    ) -> oneshot::Receiver<Result<serde_json::Value>> {
        let (tx, rx) = oneshot::channel();
        let prior = self.pending.lock().await.insert(
            id,
            PendingRequest {
                method: method.into(),
                deadline,
                tx,
            },
        );
        // Ids come from a private monotonic counter; a collision is a bug.
        debug_assert!(prior.is_none(), "duplicate correlation id {id}");
        rx
    }

    /// Resolve a pending entry from an inbound response
    ///
    /// An unknown id (already resolved, timed out, or never registered) is
    /// dropped with a warning and nothing else happens. An error payload
    /// resolves the entry with `ProtocolError`; a success payload with no
    /// `result` field resolves with `Value::Null` rather than an error.
    pub async fn resolve(&self, response: RpcResponse) {
        let entry = self.pending.lock().await.remove(&response.id);
        let Some(entry) = entry else {
            tracing::warn!(id = response.id, "response for unknown request id, dropping");
            return;
        };

        let outcome = match response.error {
            Some(error) => Err(MoonrakerError::from_rpc_error(&entry.method, error)),
            None => Ok(response.result.unwrap_or(serde_json::Value::Null)),
        };
        let _ = entry.tx.send(outcome);
    }

    /// Fail one entry with the given error. No-op for unknown ids.
    pub async fn fail(&self, id: u64, error: MoonrakerError) {
        if let Some(entry) = self.pending.lock().await.remove(&id) {
            let _ = entry.tx.send(Err(error));
        }
    }

    /// Time out every entry whose deadline has passed
    ///
    /// Safe to run concurrently with `register`/`resolve`: expiry and
    /// removal happen under the same lock, so an entry either times out
    /// here or resolves elsewhere, never both.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut pending = self.pending.lock().await;
        let expired: Vec<u64> = pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(entry) = pending.remove(id) {
                tracing::warn!(id, method = %entry.method, "request timed out");
                let _ = entry.tx.send(Err(MoonrakerError::timeout(&entry.method)));
            }
        }
        expired.len()
    }

    /// Fail every remaining entry with `ConnectionLost`. Called by the
    /// connection machinery when the transport drops; the registry is
    /// empty afterwards.
    pub async fn purge_all(&self, reason: &str) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            tracing::warn!(count = pending.len(), reason, "purging pending requests");
        }
        for (_, entry) in pending.drain() {
            let _ = entry
                .tx
                .send(Err(MoonrakerError::connection_lost(&entry.method, reason)));
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}
