//! Fan-out of server-pushed notifications
//!
//! Moonraker pushes state changes as JSON-RPC notifications (method, no
//! id). Two tiers of subscribers exist: general subscribers that see every
//! notification (coarse state mirrors), and method-keyed subscribers that
//! see only their method. Method subscriptions are keyed by
//! `(method, handler_name)` so a panel re-registering on reload replaces
//! its old callback instead of stacking a duplicate.
//!
//! Dispatch order is general subscribers first, then the method's
//! subscribers, each in registration order. Each callback runs in its own
//! task awaited in sequence, so one panicking subscriber cannot starve the
//! rest of the dispatch.

use moonraker_core::RpcNotification;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Type-erased async notification callback.
pub type NotificationFn =
    Arc<dyn Fn(RpcNotification) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Routes inbound notifications to registered subscribers.
#[derive(Clone)]
pub struct NotificationRouter {
    general: Arc<Mutex<Vec<NotificationFn>>>,
    by_method: Arc<Mutex<HashMap<String, Vec<(String, NotificationFn)>>>>,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self {
            general: Arc::new(Mutex::new(Vec::new())),
            by_method: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to every notification regardless of method.
    pub async fn register_general<F, Fut>(&self, callback: F)
    where
        F: Fn(RpcNotification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: NotificationFn = Arc::new(move |notif| Box::pin(callback(notif)));
        self.general.lock().await.push(callback);
    }

    /// Subscribe to one method under a handler name
    ///
    /// Re-registering the same `(method, handler_name)` replaces the prior
    /// callback in place, keeping its original position in dispatch order.
    pub async fn register_method<F, Fut>(
        &self,
        method: impl Into<String>,
        handler_name: impl Into<String>,
        callback: F,
    ) where
        F: Fn(RpcNotification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let method = method.into();
        let handler_name = handler_name.into();
        let callback: NotificationFn = Arc::new(move |notif| Box::pin(callback(notif)));

        let mut by_method = self.by_method.lock().await;
        let handlers = by_method.entry(method.clone()).or_default();
        match handlers.iter_mut().find(|(name, _)| *name == handler_name) {
            Some((_, slot)) => {
                tracing::debug!(%method, handler = %handler_name, "replacing method callback");
                *slot = callback;
            }
            None => {
                tracing::debug!(%method, handler = %handler_name, "registering method callback");
                handlers.push((handler_name, callback));
            }
        }
    }

    /// Remove one method subscription. Returns whether it existed.
    pub async fn unregister_method(&self, method: &str, handler_name: &str) -> bool {
        let mut by_method = self.by_method.lock().await;
        let Some(handlers) = by_method.get_mut(method) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(name, _)| name != handler_name);
        let removed = handlers.len() < before;
        if handlers.is_empty() {
            by_method.remove(method);
        }
        removed
    }

    /// Dispatch one notification to all interested subscribers
    ///
    /// Snapshots the subscriber lists before invoking anything, so a
    /// callback registering or unregistering handlers cannot deadlock the
    /// dispatch. Each callback is awaited inside its own spawned task;
    /// a panic there aborts only that task.
    pub async fn dispatch(&self, notification: RpcNotification) {
        let general: Vec<NotificationFn> = self.general.lock().await.clone();
        let method_handlers: Vec<NotificationFn> = self
            .by_method
            .lock()
            .await
            .get(&notification.method)
            .map(|handlers| handlers.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        if general.is_empty() && method_handlers.is_empty() {
            tracing::trace!(method = %notification.method, "notification with no subscribers");
            return;
        }

        for callback in general.into_iter().chain(method_handlers) {
            let notif = notification.clone();
            if tokio::spawn(callback(notif)).await.is_err() {
                tracing::error!(method = %notification.method, "notification subscriber panicked");
            }
        }
    }

    pub async fn has_method_handler(&self, method: &str, handler_name: &str) -> bool {
        self.by_method
            .lock()
            .await
            .get(method)
            .map(|handlers| handlers.iter().any(|(name, _)| name == handler_name))
            .unwrap_or(false)
    }
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self::new()
    }
}
