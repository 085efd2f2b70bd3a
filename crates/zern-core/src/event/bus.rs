use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};

use crate::error_bus::{ErrorBus, ErrorReport, EVENTS_NAMESPACE, HANDLER_ERROR_KIND};
use crate::event::adapter::EventAdapter;
use crate::event::error::EventError;
use crate::event::middleware::{EventContext, Middleware, MiddlewareOutcome};
use crate::event::{DeliveryMode, EventDefinition, StartupPolicy};
use crate::plugin_system::error::DynError;

/// An event handler. Receives the shared payload; failures are routed to
/// the error bus, never back to the emitter.
pub type EventHandler = Arc<dyn Fn(Arc<Value>) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`].
pub fn event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Arc<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DynError>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

struct HandlerEntry {
    id: u64,
    once: bool,
    handler: EventHandler,
}

struct EventEntry {
    definition: EventDefinition,
    /// Whether the event was explicitly declared (strict mode gates emits
    /// on this).
    declared: bool,
    middleware: Vec<Arc<dyn Middleware>>,
    handlers: Vec<HandlerEntry>,
    /// Pre-start FIFO queue (`Buffer` policy).
    buffered: VecDeque<Arc<Value>>,
    /// Latest pre-start value (`Sticky` policy), before start.
    pending_sticky: Option<Arc<Value>>,
    /// The sticky value frozen at start; delivered to late subscribers.
    sticky: Option<Arc<Value>>,
}

impl EventEntry {
    fn undeclared() -> Self {
        Self {
            definition: EventDefinition::default(),
            declared: false,
            middleware: Vec::new(),
            handlers: Vec::new(),
            buffered: VecDeque::new(),
            pending_sticky: None,
            sticky: None,
        }
    }
}

#[derive(Default)]
struct NamespaceEntry {
    middleware: Vec<Arc<dyn Middleware>>,
    events: HashMap<String, EventEntry>,
}

enum Dispatch {
    /// A deferred emission: the full pipeline runs on the dispatcher.
    Emission {
        namespace: String,
        key: String,
        mode: DeliveryMode,
        payload: Arc<Value>,
        /// Part of the startup replay; drains the replay counter.
        replay: bool,
    },
    /// Sticky delivery targeted at a single subscriber.
    Single {
        namespace: String,
        key: String,
        id: u64,
        payload: Arc<Value>,
        /// Part of the startup replay; drains the replay counter.
        replay: bool,
    },
}

#[derive(Debug, Default)]
struct BusStats {
    emitted: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    buffered: AtomicU64,
    halted: AtomicU64,
    handler_errors: AtomicU64,
}

/// Per-bus observability counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBusSnapshot {
    pub emitted: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub buffered: u64,
    pub halted: u64,
    pub handler_errors: u64,
}

struct BusInner {
    strict: bool,
    started: AtomicBool,
    destroyed: AtomicBool,
    namespaces: RwLock<HashMap<String, NamespaceEntry>>,
    global_middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    adapters: RwLock<Vec<Arc<dyn EventAdapter>>>,
    deferred_tx: Mutex<Option<mpsc::UnboundedSender<Dispatch>>>,
    deferred_rx: Mutex<Option<mpsc::UnboundedReceiver<Dispatch>>>,
    /// Startup replays still queued on the dispatcher. Post-start sync
    /// emits wait for this to drain so FIFO order holds.
    replay_pending: AtomicUsize,
    replay_done_tx: watch::Sender<bool>,
    replay_done_rx: watch::Receiver<bool>,
    next_id: AtomicU64,
    errors: ErrorBus,
    stats: BusStats,
}

/// The event bus: namespaced addresses, per-event delivery modes and
/// startup policies, a three-tier middleware chain, and adapter fan-out.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus. In strict mode, emits for undeclared addresses are
    /// rejected; otherwise they lazily define an unadorned event.
    pub fn new(strict: bool, errors: ErrorBus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (replay_done_tx, replay_done_rx) = watch::channel(true);
        Self {
            inner: Arc::new(BusInner {
                strict,
                started: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                namespaces: RwLock::new(HashMap::new()),
                global_middleware: RwLock::new(Vec::new()),
                adapters: RwLock::new(Vec::new()),
                deferred_tx: Mutex::new(Some(tx)),
                deferred_rx: Mutex::new(Some(rx)),
                replay_pending: AtomicUsize::new(0),
                replay_done_tx,
                replay_done_rx,
                next_id: AtomicU64::new(1),
                errors,
                stats: BusStats::default(),
            }),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Declare an event. Namespaces are created lazily; re-declaration
    /// updates the definition of an existing entry.
    pub fn define_event(
        &self,
        namespace: &str,
        key: &str,
        definition: EventDefinition,
    ) {
        let mut namespaces = self.inner.namespaces.write();
        let entry = namespaces
            .entry(namespace.to_string())
            .or_default()
            .events
            .entry(key.to_string())
            .or_insert_with(EventEntry::undeclared);
        entry.definition = definition;
        entry.declared = true;
    }

    /// Install a bus-wide middleware stage.
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.inner.global_middleware.write().push(middleware);
    }

    /// Install a namespace middleware stage.
    pub fn add_namespace_middleware(&self, namespace: &str, middleware: Arc<dyn Middleware>) {
        self.inner
            .namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .middleware
            .push(middleware);
    }

    /// Install a per-event middleware stage.
    pub fn add_event_middleware(&self, namespace: &str, key: &str, middleware: Arc<dyn Middleware>) {
        self.inner
            .namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .events
            .entry(key.to_string())
            .or_insert_with(EventEntry::undeclared)
            .middleware
            .push(middleware);
    }

    /// Wire in an observer adapter.
    pub fn add_adapter(&self, adapter: Arc<dyn EventAdapter>) {
        self.inner.adapters.write().push(adapter);
    }

    /// Subscribe to an event. Returns an idempotent unsubscribe token.
    ///
    /// Subscribing the exact same handler `Arc` twice is a no-op (set
    /// semantics): the existing subscription's token comes back. If the
    /// event carries a frozen sticky value and the bus is started, the
    /// new subscriber receives it exactly once.
    pub async fn on(
        &self,
        namespace: &str,
        key: &str,
        handler: EventHandler,
    ) -> Result<Subscription, EventError> {
        self.subscribe_inner(namespace, key, handler, false).await
    }

    /// Resolve with the next emitted value, then auto-unsubscribe.
    pub async fn once(&self, namespace: &str, key: &str) -> Result<OnceValue, EventError> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let handler = event_handler(move |payload: Arc<Value>| {
            let slot = Arc::clone(&slot);
            async move {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(payload);
                }
                Ok(())
            }
        });
        self.subscribe_inner(namespace, key, handler, true).await?;
        Ok(OnceValue { rx })
    }

    async fn subscribe_inner(
        &self,
        namespace: &str,
        key: &str,
        handler: EventHandler,
        once: bool,
    ) -> Result<Subscription, EventError> {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(EventError::Destroyed);
        }

        let (id, sticky, delivery) = {
            let mut namespaces = self.inner.namespaces.write();
            let entry = namespaces
                .entry(namespace.to_string())
                .or_default()
                .events
                .entry(key.to_string())
                .or_insert_with(EventEntry::undeclared);

            // Set semantics on the handler reference.
            if let Some(existing) = entry
                .handlers
                .iter()
                .find(|e| Arc::ptr_eq(&e.handler, &handler))
            {
                let id = existing.id;
                return Ok(self.subscription(namespace, key, id));
            }

            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            entry.handlers.push(HandlerEntry { id, once, handler: Arc::clone(&handler) });
            (id, entry.sticky.clone(), entry.definition.delivery)
        };

        if let Some(payload) = sticky {
            if self.is_started() {
                match delivery {
                    DeliveryMode::Sync => {
                        self.deliver_single(namespace, key, id, payload).await;
                    }
                    DeliveryMode::Microtask | DeliveryMode::Async => {
                        self.enqueue(Dispatch::Single {
                            namespace: namespace.to_string(),
                            key: key.to_string(),
                            id,
                            payload,
                            replay: false,
                        });
                    }
                }
            }
        }

        Ok(self.subscription(namespace, key, id))
    }

    fn subscription(&self, namespace: &str, key: &str, id: u64) -> Subscription {
        Subscription {
            bus: Arc::downgrade(&self.inner),
            namespace: namespace.to_string(),
            key: key.to_string(),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Emit an event.
    ///
    /// Before [`start`](Self::start), the event's startup policy applies.
    /// Afterwards, the payload runs through the middleware chain, adapters
    /// observe, and handlers run per the event's delivery mode.
    pub async fn emit(&self, namespace: &str, key: &str, payload: Value) -> Result<(), EventError> {
        self.emit_shared(namespace, key, Arc::new(payload)).await
    }

    /// [`emit`](Self::emit) for payloads that are already shared.
    pub async fn emit_shared(
        &self,
        namespace: &str,
        key: &str,
        payload: Arc<Value>,
    ) -> Result<(), EventError> {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(EventError::Destroyed);
        }
        self.inner.stats.emitted.fetch_add(1, Ordering::Relaxed);

        let (startup, delivery) = {
            let mut namespaces = self.inner.namespaces.write();
            let known = namespaces
                .get(namespace)
                .and_then(|ns| ns.events.get(key))
                .map(|e| e.declared)
                .unwrap_or(false);
            if !known {
                if self.inner.strict {
                    return Err(EventError::UnknownEvent {
                        namespace: namespace.to_string(),
                        key: key.to_string(),
                    });
                }
                // Permissive mode lazily defines an unadorned event.
                let entry = namespaces
                    .entry(namespace.to_string())
                    .or_default()
                    .events
                    .entry(key.to_string())
                    .or_insert_with(EventEntry::undeclared);
                entry.declared = true;
            }
            let entry = namespaces
                .get(namespace)
                .and_then(|ns| ns.events.get(key))
                .expect("event entry just ensured");
            (entry.definition.startup, entry.definition.delivery)
        };

        if !self.is_started() {
            self.apply_startup_policy(namespace, key, startup, payload);
            return Ok(());
        }

        match delivery {
            DeliveryMode::Sync => {
                // Startup replays queued on the dispatcher come first.
                self.wait_for_replay_drain().await;
                self.run_pipeline(namespace, key, payload).await
            }
            DeliveryMode::Microtask | DeliveryMode::Async => {
                self.enqueue(Dispatch::Emission {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    mode: delivery,
                    payload,
                    replay: false,
                });
                Ok(())
            }
        }
    }

    async fn wait_for_replay_drain(&self) {
        if self.inner.replay_pending.load(Ordering::SeqCst) == 0 {
            return;
        }
        let mut done = self.inner.replay_done_rx.clone();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                return;
            }
        }
    }

    fn apply_startup_policy(
        &self,
        namespace: &str,
        key: &str,
        policy: StartupPolicy,
        payload: Arc<Value>,
    ) {
        match policy {
            StartupPolicy::Drop => {
                self.inner.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
            StartupPolicy::Buffer(limit) => {
                let mut namespaces = self.inner.namespaces.write();
                if let Some(entry) = namespaces
                    .get_mut(namespace)
                    .and_then(|ns| ns.events.get_mut(key))
                {
                    // Oldest entries give way when the buffer is full.
                    while entry.buffered.len() >= limit.max(1) {
                        entry.buffered.pop_front();
                        self.inner.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    entry.buffered.push_back(payload);
                    self.inner.stats.buffered.fetch_add(1, Ordering::Relaxed);
                }
            }
            StartupPolicy::Sticky => {
                let mut namespaces = self.inner.namespaces.write();
                if let Some(entry) = namespaces
                    .get_mut(namespace)
                    .and_then(|ns| ns.events.get_mut(key))
                {
                    entry.pending_sticky = Some(payload);
                }
            }
        }
    }

    /// Signal readiness.
    ///
    /// Spawns the FIFO dispatcher, then queues every buffered payload on
    /// it. The replays run through the full pipeline, in FIFO order,
    /// strictly before any post-start emit is processed. Sticky values
    /// freeze to their final pre-start payload and are delivered once to
    /// every handler alive now; future subscribers receive the frozen
    /// value at subscription time.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(mut rx) = self.inner.deferred_rx.lock().take() {
            let bus = self.clone();
            tokio::spawn(async move {
                while let Some(dispatch) = rx.recv().await {
                    bus.handle_dispatch(dispatch).await;
                }
            });
        }

        // Deterministic replay order: namespaces, then keys, sorted.
        let mut addresses: Vec<(String, String)> = {
            let namespaces = self.inner.namespaces.read();
            namespaces
                .iter()
                .flat_map(|(ns, entry)| entry.events.keys().map(move |k| (ns.clone(), k.clone())))
                .collect()
        };
        addresses.sort();

        let mut replays: Vec<Dispatch> = Vec::new();
        for (namespace, key) in addresses {
            let mut namespaces = self.inner.namespaces.write();
            let Some(entry) = namespaces
                .get_mut(&namespace)
                .and_then(|ns| ns.events.get_mut(&key))
            else {
                continue;
            };

            for payload in entry.buffered.drain(..) {
                replays.push(Dispatch::Emission {
                    namespace: namespace.clone(),
                    key: key.clone(),
                    mode: DeliveryMode::Microtask,
                    payload,
                    replay: true,
                });
            }
            if let Some(payload) = entry.pending_sticky.take() {
                entry.sticky = Some(Arc::clone(&payload));
                // Start-time handlers each get the frozen value once.
                for handler in &entry.handlers {
                    replays.push(Dispatch::Single {
                        namespace: namespace.clone(),
                        key: key.clone(),
                        id: handler.id,
                        payload: Arc::clone(&payload),
                        replay: true,
                    });
                }
            }
        }

        if !replays.is_empty() {
            self.inner.replay_pending.store(replays.len(), Ordering::SeqCst);
            let _ = self.inner.replay_done_tx.send(false);
            for dispatch in replays {
                self.enqueue(dispatch);
            }
        }
    }

    /// Tear the bus down: reject further emits, drop all subscriptions,
    /// and stop the dispatcher once its queue drains.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.inner.deferred_tx.lock().take();
        let mut namespaces = self.inner.namespaces.write();
        for ns in namespaces.values_mut() {
            for entry in ns.events.values_mut() {
                entry.handlers.clear();
                entry.buffered.clear();
                entry.pending_sticky = None;
                entry.sticky = None;
            }
        }
    }

    fn enqueue(&self, dispatch: Dispatch) {
        let tx = self.inner.deferred_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(dispatch);
        }
    }

    async fn handle_dispatch(&self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Emission { namespace, key, mode, payload, replay } => {
                if mode == DeliveryMode::Async && !replay {
                    // Defer past work already scheduled on this turn.
                    tokio::task::yield_now().await;
                }
                if let Err(err) = self.run_pipeline(&namespace, &key, payload).await {
                    log::warn!("deferred dispatch of '{namespace}/{key}' failed: {err}");
                }
                if replay {
                    self.finish_replay();
                }
            }
            Dispatch::Single { namespace, key, id, payload, replay } => {
                self.deliver_single(&namespace, &key, id, payload).await;
                if replay {
                    self.finish_replay();
                }
            }
        }
    }

    fn finish_replay(&self) {
        if self.inner.replay_pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.inner.replay_done_tx.send(true);
        }
    }

    /// The full emission pipeline: middleware chain (bus → namespace →
    /// event), adapter observation, then handler dispatch in
    /// subscription order.
    async fn run_pipeline(
        &self,
        namespace: &str,
        key: &str,
        payload: Arc<Value>,
    ) -> Result<(), EventError> {
        let chain: Vec<Arc<dyn Middleware>> = {
            let global = self.inner.global_middleware.read().clone();
            let namespaces = self.inner.namespaces.read();
            let mut chain = global;
            if let Some(ns) = namespaces.get(namespace) {
                chain.extend(ns.middleware.iter().cloned());
                if let Some(entry) = ns.events.get(key) {
                    chain.extend(entry.middleware.iter().cloned());
                }
            }
            chain
        };

        let mut ctx = EventContext::new(namespace, key, payload);
        for stage in chain {
            if stage.handle(&mut ctx).await == MiddlewareOutcome::Halt {
                self.inner.stats.halted.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        let adapters = self.inner.adapters.read().clone();
        for adapter in adapters {
            adapter.observe(&ctx);
        }

        let handlers = self.take_handler_snapshot(namespace, key);
        for handler in handlers {
            self.invoke_handler(namespace, key, &handler, Arc::clone(&ctx.payload)).await;
        }
        Ok(())
    }

    /// Snapshot the handler list for dispatch, removing `once` entries as
    /// they are claimed. Handlers may freely (un)subscribe during
    /// dispatch without touching this snapshot.
    fn take_handler_snapshot(&self, namespace: &str, key: &str) -> Vec<EventHandler> {
        let mut namespaces = self.inner.namespaces.write();
        match namespaces.get_mut(namespace).and_then(|ns| ns.events.get_mut(key)) {
            Some(entry) => {
                let snapshot: Vec<EventHandler> =
                    entry.handlers.iter().map(|e| Arc::clone(&e.handler)).collect();
                entry.handlers.retain(|e| !e.once);
                snapshot
            }
            None => Vec::new(),
        }
    }

    async fn deliver_single(&self, namespace: &str, key: &str, id: u64, payload: Arc<Value>) {
        let handler = {
            let mut namespaces = self.inner.namespaces.write();
            match namespaces.get_mut(namespace).and_then(|ns| ns.events.get_mut(key)) {
                Some(entry) => match entry.handlers.iter().position(|e| e.id == id) {
                    Some(index) => {
                        let handler = Arc::clone(&entry.handlers[index].handler);
                        if entry.handlers[index].once {
                            entry.handlers.remove(index);
                        }
                        Some(handler)
                    }
                    None => None,
                },
                None => None,
            }
        };
        if let Some(handler) = handler {
            self.invoke_handler(namespace, key, &handler, payload).await;
        }
    }

    async fn invoke_handler(
        &self,
        namespace: &str,
        key: &str,
        handler: &EventHandler,
        payload: Arc<Value>,
    ) {
        match handler(payload).await {
            Ok(()) => {
                self.inner.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(cause) => {
                self.inner.stats.handler_errors.fetch_add(1, Ordering::Relaxed);
                let wrapped = EventError::HandlerError {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    cause,
                };
                self.inner
                    .errors
                    .report(
                        ErrorReport::new(
                            EVENTS_NAMESPACE,
                            HANDLER_ERROR_KIND,
                            format!("event handler for '{namespace}/{key}' failed"),
                        )
                        .with_meta(json!({ "namespace": namespace, "key": key }))
                        .with_cause(wrapped),
                    )
                    .await;
            }
        }
    }

    /// Number of live subscribers for an address.
    pub fn subscriber_count(&self, namespace: &str, key: &str) -> usize {
        self.inner
            .namespaces
            .read()
            .get(namespace)
            .and_then(|ns| ns.events.get(key))
            .map(|entry| entry.handlers.len())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> EventBusSnapshot {
        let stats = &self.inner.stats;
        EventBusSnapshot {
            emitted: stats.emitted.load(Ordering::Relaxed),
            delivered: stats.delivered.load(Ordering::Relaxed),
            dropped: stats.dropped.load(Ordering::Relaxed),
            buffered: stats.buffered.load(Ordering::Relaxed),
            halted: stats.halted.load(Ordering::Relaxed),
            handler_errors: stats.handler_errors.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("strict", &self.inner.strict)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

/// The value resolved by [`EventBus::once`].
pub struct OnceValue {
    rx: oneshot::Receiver<Arc<Value>>,
}

impl OnceValue {
    /// Wait for the next emission. Yields `None` if the bus is destroyed
    /// before the event fires.
    pub async fn wait(self) -> Option<Arc<Value>> {
        self.rx.await.ok()
    }
}

/// Unsubscribe token. Idempotent, and safe to call after the bus has been
/// destroyed.
pub struct Subscription {
    bus: Weak<BusInner>,
    namespace: String,
    key: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            let mut namespaces = inner.namespaces.write();
            if let Some(entry) = namespaces
                .get_mut(&self.namespace)
                .and_then(|ns| ns.events.get_mut(&self.key))
            {
                entry.handlers.retain(|e| e.id != self.id);
            }
        }
    }
}
