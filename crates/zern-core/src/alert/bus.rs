use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;

use crate::alert::channel::AlertChannel;
use crate::alert::Alert;
use crate::plugin_system::error::DynError;

/// An alert subscriber. Failures are isolated: logged, never re-thrown.
pub type AlertHandler = Arc<dyn Fn(Alert) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;

/// Wrap an async closure as an [`AlertHandler`].
pub fn alert_handler<F, Fut>(f: F) -> AlertHandler
where
    F: Fn(Alert) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DynError>> + Send + 'static,
{
    Arc::new(move |alert| Box::pin(f(alert)))
}

struct SubscriberEntry {
    id: u64,
    handler: AlertHandler,
}

struct AlertInner {
    subscribers: RwLock<Vec<SubscriberEntry>>,
    channels: RwLock<Vec<Arc<dyn AlertChannel>>>,
    namespaces: RwLock<HashSet<String>>,
    next_id: AtomicU64,
}

/// Pure fan-out: every subscriber receives `(namespace, kind, payload)`,
/// then every registered channel receives the emission, awaited in
/// channel-registration order.
#[derive(Clone)]
pub struct AlertBus {
    inner: Arc<AlertInner>,
}

impl AlertBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AlertInner {
                subscribers: RwLock::new(Vec::new()),
                channels: RwLock::new(Vec::new()),
                namespaces: RwLock::new(HashSet::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Record a namespace declaration for introspection.
    pub fn declare_namespace(&self, namespace: &str) {
        self.inner.namespaces.write().insert(namespace.to_string());
    }

    /// Declared namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut all: Vec<String> = self.inner.namespaces.read().iter().cloned().collect();
        all.sort();
        all
    }

    /// Subscribe to every alert.
    pub fn on(&self, handler: AlertHandler) -> AlertSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push(SubscriberEntry { id, handler });
        AlertSubscription {
            bus: Arc::downgrade(&self.inner),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Register a channel. Channels observe after subscribers.
    pub fn add_channel(&self, channel: Arc<dyn AlertChannel>) {
        self.inner.channels.write().push(channel);
    }

    /// Emit an alert. Subscribers run first, in subscription order; then
    /// channels, in registration order. Failures on either side are
    /// isolated and logged.
    pub async fn emit(&self, namespace: &str, kind: &str, payload: Value) {
        let alert = Alert {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            payload: Arc::new(payload),
        };

        let subscribers: Vec<AlertHandler> = {
            let entries = self.inner.subscribers.read();
            entries.iter().map(|e| Arc::clone(&e.handler)).collect()
        };
        for handler in subscribers {
            if let Err(err) = handler(alert.clone()).await {
                log::warn!("alert subscriber for [{namespace}/{kind}] failed: {err}");
            }
        }

        let channels: Vec<Arc<dyn AlertChannel>> = self.inner.channels.read().clone();
        for channel in channels {
            if let Err(err) = channel.dispatch(&alert).await {
                log::error!("alert channel '{}' failed: {err}", channel.name());
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn channel_count(&self) -> usize {
        self.inner.channels.read().len()
    }
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AlertBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertBus")
            .field("subscribers", &self.subscriber_count())
            .field("channels", &self.channel_count())
            .finish()
    }
}

/// Unsubscribe token. Idempotent, safe after the bus is gone.
pub struct AlertSubscription {
    bus: Weak<AlertInner>,
    id: u64,
    active: AtomicBool,
}

impl AlertSubscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            inner.subscribers.write().retain(|e| e.id != self.id);
        }
    }
}
