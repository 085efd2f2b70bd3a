use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::error_bus::{ErrorBus, ErrorReport, HANDLER_ERROR_KIND, HOOKS_NAMESPACE};
use crate::hook::error::HookError;
use crate::plugin_system::error::DynError;

/// A hook handler. Receives the shared payload; failures are routed to
/// the error bus, never back to the emitter.
pub type HookHandler = Arc<dyn Fn(Arc<Value>) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;

/// Wrap an async closure as a [`HookHandler`].
pub fn hook_handler<F, Fut>(f: F) -> HookHandler
where
    F: Fn(Arc<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DynError>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

struct HandlerEntry {
    id: u64,
    once: bool,
    handler: HookHandler,
}

struct HookInner {
    /// namespace -> key -> subscribers. Keys exist only once declared.
    hooks: RwLock<HashMap<String, HashMap<String, Vec<HandlerEntry>>>>,
    next_id: AtomicU64,
    errors: ErrorBus,
}

/// Per-key typed hooks, created eagerly by plugins.
///
/// Dispatch is inline and awaited in subscription order, with the same
/// shared-payload rule as the event bus.
#[derive(Clone)]
pub struct HookBus {
    inner: Arc<HookInner>,
}

impl HookBus {
    pub fn new(errors: ErrorBus) -> Self {
        Self {
            inner: Arc::new(HookInner {
                hooks: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                errors,
            }),
        }
    }

    /// Eagerly declare a hook key.
    pub fn define(&self, namespace: &str, key: &str) {
        self.inner
            .hooks
            .write()
            .entry(namespace.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default();
    }

    pub fn has_hook(&self, namespace: &str, key: &str) -> bool {
        self.inner
            .hooks
            .read()
            .get(namespace)
            .is_some_and(|keys| keys.contains_key(key))
    }

    /// Subscribe to a declared hook. Subscribing the same handler `Arc`
    /// twice is a no-op (set semantics).
    pub fn on(
        &self,
        namespace: &str,
        key: &str,
        handler: HookHandler,
    ) -> Result<HookSubscription, HookError> {
        self.subscribe_inner(namespace, key, handler, false)
    }

    /// Resolve with the next emitted value, then auto-unsubscribe.
    pub fn once(&self, namespace: &str, key: &str) -> Result<OnceHook, HookError> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let handler = hook_handler(move |payload: Arc<Value>| {
            let slot = Arc::clone(&slot);
            async move {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(payload);
                }
                Ok(())
            }
        });
        self.subscribe_inner(namespace, key, handler, true)?;
        Ok(OnceHook { rx })
    }

    fn subscribe_inner(
        &self,
        namespace: &str,
        key: &str,
        handler: HookHandler,
        once: bool,
    ) -> Result<HookSubscription, HookError> {
        let mut hooks = self.inner.hooks.write();
        let entries = hooks
            .get_mut(namespace)
            .and_then(|keys| keys.get_mut(key))
            .ok_or_else(|| HookError::UnknownHook {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })?;

        if let Some(existing) = entries.iter().find(|e| Arc::ptr_eq(&e.handler, &handler)) {
            return Ok(self.subscription(namespace, key, existing.id));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        entries.push(HandlerEntry { id, once, handler });
        Ok(self.subscription(namespace, key, id))
    }

    fn subscription(&self, namespace: &str, key: &str, id: u64) -> HookSubscription {
        HookSubscription {
            bus: Arc::downgrade(&self.inner),
            namespace: namespace.to_string(),
            key: key.to_string(),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Remove a handler by reference.
    pub fn off(&self, namespace: &str, key: &str, handler: &HookHandler) {
        let mut hooks = self.inner.hooks.write();
        if let Some(entries) = hooks.get_mut(namespace).and_then(|keys| keys.get_mut(key)) {
            entries.retain(|e| !Arc::ptr_eq(&e.handler, handler));
        }
    }

    /// Emit on a declared hook. Handlers run inline, awaited in
    /// subscription order; a handler failure is reported on the error bus
    /// and delivery continues.
    pub async fn emit(&self, namespace: &str, key: &str, payload: Value) -> Result<(), HookError> {
        let payload = Arc::new(payload);

        // Snapshot before dispatch; once-handlers are claimed here.
        let handlers: Vec<HookHandler> = {
            let mut hooks = self.inner.hooks.write();
            let entries = hooks
                .get_mut(namespace)
                .and_then(|keys| keys.get_mut(key))
                .ok_or_else(|| HookError::UnknownHook {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                })?;
            let snapshot = entries.iter().map(|e| Arc::clone(&e.handler)).collect();
            entries.retain(|e| !e.once);
            snapshot
        };

        for handler in handlers {
            if let Err(cause) = handler(Arc::clone(&payload)).await {
                let wrapped = HookError::HandlerError {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    cause,
                };
                self.inner
                    .errors
                    .report(
                        ErrorReport::new(
                            HOOKS_NAMESPACE,
                            HANDLER_ERROR_KIND,
                            format!("hook handler for '{namespace}/{key}' failed"),
                        )
                        .with_meta(json!({ "namespace": namespace, "key": key }))
                        .with_cause(wrapped),
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Number of live subscribers for a key.
    pub fn subscriber_count(&self, namespace: &str, key: &str) -> usize {
        self.inner
            .hooks
            .read()
            .get(namespace)
            .and_then(|keys| keys.get(key))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus").finish_non_exhaustive()
    }
}

/// The value resolved by [`HookBus::once`].
pub struct OnceHook {
    rx: oneshot::Receiver<Arc<Value>>,
}

impl OnceHook {
    pub async fn wait(self) -> Option<Arc<Value>> {
        self.rx.await.ok()
    }
}

/// Unsubscribe token. Idempotent, safe after the bus is gone.
pub struct HookSubscription {
    bus: Weak<HookInner>,
    namespace: String,
    key: String,
    id: u64,
    active: AtomicBool,
}

impl HookSubscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            let mut hooks = inner.hooks.write();
            if let Some(entries) = hooks
                .get_mut(&self.namespace)
                .and_then(|keys| keys.get_mut(&self.key))
            {
                entries.retain(|e| e.id != self.id);
            }
        }
    }
}
