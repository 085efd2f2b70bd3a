use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::event::middleware::EventContext;

/// A trusted observer of the event bus.
///
/// Adapters see every emission exactly once (after internal middleware,
/// and before handlers for sync/microtask delivery) and never
/// participate in delivery.
pub trait EventAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn observe(&self, ctx: &EventContext);
}

/// Snapshot of one observed emission.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub namespace: String,
    pub key: String,
    pub payload: Arc<Value>,
    pub meta: HashMap<String, Value>,
}

impl From<&EventContext> for EmittedEvent {
    fn from(ctx: &EventContext) -> Self {
        Self {
            namespace: ctx.namespace.clone(),
            key: ctx.key.clone(),
            payload: Arc::clone(&ctx.payload),
            meta: ctx.meta.clone(),
        }
    }
}

/// Node-style emitter adapter backed by a broadcast channel. Slow
/// receivers lag and lose the oldest entries, never blocking the bus.
pub struct BroadcastAdapter {
    tx: broadcast::Sender<EmittedEvent>,
}

impl BroadcastAdapter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.tx.subscribe()
    }
}

impl EventAdapter for BroadcastAdapter {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn observe(&self, ctx: &EventContext) {
        // No receivers is fine; the adapter only observes.
        let _ = self.tx.send(EmittedEvent::from(ctx));
    }
}

/// Subject-style adapter exposing emissions as a `Stream`.
pub struct StreamAdapter {
    tx: mpsc::UnboundedSender<EmittedEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<EmittedEvent>>>,
}

impl StreamAdapter {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Take the emission stream. Yields `None` after the first call.
    pub fn take_stream(&self) -> Option<UnboundedReceiverStream<EmittedEvent>> {
        self.rx.lock().take().map(UnboundedReceiverStream::new)
    }
}

impl Default for StreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventAdapter for StreamAdapter {
    fn name(&self) -> &str {
        "stream"
    }

    fn observe(&self, ctx: &EventContext) {
        let _ = self.tx.send(EmittedEvent::from(ctx));
    }
}
