use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::error_bus::policy::{ErrorPolicy, LogPolicy};
use crate::error_bus::report::{ErrorFactory, ErrorReport};

/// An error-bus handler. Handlers cannot fail; anything recoverable goes
/// through [`retrying`](crate::error_bus::policy::retrying).
pub type ErrorHandler = Arc<dyn Fn(Arc<ErrorReport>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as an [`ErrorHandler`].
pub fn error_handler<F, Fut>(f: F) -> ErrorHandler
where
    F: Fn(Arc<ErrorReport>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |report| Box::pin(f(report)))
}

struct HandlerEntry {
    id: u64,
    handler: ErrorHandler,
}

#[derive(Debug, Default)]
struct ErrorBusStats {
    reported: AtomicU64,
    delivered: AtomicU64,
}

struct ErrorBusInner {
    /// namespace -> kind -> subscribers
    namespaces: RwLock<HashMap<String, HashMap<String, Vec<HandlerEntry>>>>,
    pipeline: RwLock<Vec<Arc<dyn ErrorPolicy>>>,
    next_id: AtomicU64,
    stats: ErrorBusStats,
}

/// Per-bus observability counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBusSnapshot {
    pub reported: u64,
    pub delivered: u64,
}

/// Typed error distribution: declared `(namespace, kind)` factories, a
/// configurable policy pipeline, and per-kind subscribers.
#[derive(Clone)]
pub struct ErrorBus {
    inner: Arc<ErrorBusInner>,
}

impl ErrorBus {
    /// New bus with the default pipeline (a single log stage).
    pub fn new() -> Self {
        Self::with_pipeline(vec![Arc::new(LogPolicy::default())])
    }

    /// New bus with an explicit policy pipeline.
    pub fn with_pipeline(pipeline: Vec<Arc<dyn ErrorPolicy>>) -> Self {
        Self {
            inner: Arc::new(ErrorBusInner {
                namespaces: RwLock::new(HashMap::new()),
                pipeline: RwLock::new(pipeline),
                next_id: AtomicU64::new(1),
                stats: ErrorBusStats::default(),
            }),
        }
    }

    /// Declare the kinds of a namespace and get back their factories.
    pub fn define_errors(&self, namespace: &str, kinds: &[&str]) -> Vec<ErrorFactory> {
        let mut namespaces = self.inner.namespaces.write();
        let entry = namespaces.entry(namespace.to_string()).or_default();
        kinds
            .iter()
            .map(|kind| {
                entry.entry(kind.to_string()).or_default();
                ErrorFactory::new(namespace, kind)
            })
            .collect()
    }

    /// Replace the policy pipeline.
    pub fn set_pipeline(&self, pipeline: Vec<Arc<dyn ErrorPolicy>>) {
        *self.inner.pipeline.write() = pipeline;
    }

    /// Append a policy stage.
    pub fn push_policy(&self, policy: Arc<dyn ErrorPolicy>) {
        self.inner.pipeline.write().push(policy);
    }

    /// Subscribe to a declared kind via its factory.
    pub fn on(&self, factory: &ErrorFactory, handler: ErrorHandler) -> ErrorSubscription {
        self.on_kind(factory.namespace(), factory.kind(), handler)
    }

    /// Subscribe to a `(namespace, kind)` pair directly.
    pub fn on_kind(&self, namespace: &str, kind: &str, handler: ErrorHandler) -> ErrorSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut namespaces = self.inner.namespaces.write();
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .entry(kind.to_string())
            .or_default()
            .push(HandlerEntry { id, handler });
        ErrorSubscription {
            bus: Arc::downgrade(&self.inner),
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Run the policy pipeline over `report`, then dispatch it to every
    /// subscriber of its `(namespace, kind)`.
    pub async fn report(&self, report: ErrorReport) {
        self.inner.stats.reported.fetch_add(1, Ordering::Relaxed);

        let mut report = report;
        let pipeline: Vec<Arc<dyn ErrorPolicy>> = self.inner.pipeline.read().clone();
        for stage in pipeline {
            stage.apply(&mut report).await;
        }

        // Snapshot before dispatch so handlers may (un)subscribe freely.
        let handlers: Vec<ErrorHandler> = {
            let namespaces = self.inner.namespaces.read();
            namespaces
                .get(&report.namespace)
                .and_then(|kinds| kinds.get(&report.kind))
                .map(|entries| entries.iter().map(|e| Arc::clone(&e.handler)).collect())
                .unwrap_or_default()
        };

        let report = Arc::new(report);
        for handler in handlers {
            handler(Arc::clone(&report)).await;
            self.inner.stats.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of subscribers for a `(namespace, kind)` pair.
    pub fn subscriber_count(&self, namespace: &str, kind: &str) -> usize {
        self.inner
            .namespaces
            .read()
            .get(namespace)
            .and_then(|kinds| kinds.get(kind))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> ErrorBusSnapshot {
        ErrorBusSnapshot {
            reported: self.inner.stats.reported.load(Ordering::Relaxed),
            delivered: self.inner.stats.delivered.load(Ordering::Relaxed),
        }
    }
}

impl Default for ErrorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorBus").finish_non_exhaustive()
    }
}

/// Unsubscribe token. Idempotent, and safe to call after the bus is gone.
pub struct ErrorSubscription {
    bus: Weak<ErrorBusInner>,
    namespace: String,
    kind: String,
    id: u64,
    active: AtomicBool,
}

impl ErrorSubscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            let mut namespaces = inner.namespaces.write();
            if let Some(entries) = namespaces
                .get_mut(&self.namespace)
                .and_then(|kinds| kinds.get_mut(&self.kind))
            {
                entries.retain(|entry| entry.id != self.id);
            }
        }
    }
}
