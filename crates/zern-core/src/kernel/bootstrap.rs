use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::alert::AlertBus;
use crate::error_bus::ErrorBus;
use crate::event::adapter::{BroadcastAdapter, StreamAdapter};
use crate::event::{DeliveryMode, EventBus, EventDefinition, StartupPolicy};
use crate::hook::HookBus;
use crate::kernel::constants::{
    KERNEL_EVENT_BUFFER, KERNEL_NAMESPACE, MULTIPLE_AUGMENTS_KIND, PLUGIN_FAILED_EVENT,
    PLUGIN_LOADED_EVENT,
};
use crate::kernel::context::KernelContext;
use crate::kernel::error::{KernelError, KernelState, Result};
use crate::kernel::options::KernelOptions;
use crate::lifecycle::LifecycleEngine;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::graph::ConstraintGraph;
use crate::plugin_system::plugin::{ApiDefinition, ApiHandle, Plugin, SetupContext};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::resolver::{Conflict, DependencyResolver};
use crate::plugin_system::AugmentationMerger;
use crate::recovery::RecoveryManager;

/// Resolved boot state retained for teardown.
struct ResolvedState {
    order: Vec<String>,
    plugins: HashMap<String, Arc<Plugin>>,
    graph: ConstraintGraph,
}

/// The kernel facade: composes the resolver, lifecycle engine,
/// augmentation merger, and the four buses behind one handle.
///
/// State machine: `uninitialized → initializing → initialized →
/// destroying → destroyed`, with `error` absorbing. `init` is idempotent
/// after settling; repeated calls return the same outcome.
pub struct Kernel {
    options: KernelOptions,
    registry: PluginRegistry,
    pending_conflicts: Vec<Conflict>,
    ctx: Arc<KernelContext>,
    engine: LifecycleEngine,
    resolver: DependencyResolver,
    state: RwLock<KernelState>,
    init_outcome: Mutex<Option<Result<()>>>,
    resolved: RwLock<Option<ResolvedState>>,
    loaded: RwLock<Vec<String>>,
    apis: RwLock<HashMap<String, Arc<ApiHandle>>>,
    broadcast_adapter: Option<Arc<BroadcastAdapter>>,
    stream_adapter: Option<Arc<StreamAdapter>>,
}

impl Kernel {
    #[allow(clippy::too_many_arguments, reason = "assembled only by the builder")]
    pub(crate) fn new(
        options: KernelOptions,
        registry: PluginRegistry,
        pending_conflicts: Vec<Conflict>,
        ctx: Arc<KernelContext>,
        engine: LifecycleEngine,
        resolver: DependencyResolver,
        broadcast_adapter: Option<Arc<BroadcastAdapter>>,
        stream_adapter: Option<Arc<StreamAdapter>>,
    ) -> Self {
        Self {
            options,
            registry,
            pending_conflicts,
            ctx,
            engine,
            resolver,
            state: RwLock::new(KernelState::Building),
            init_outcome: Mutex::new(None),
            resolved: RwLock::new(None),
            loaded: RwLock::new(Vec::new()),
            apis: RwLock::new(HashMap::new()),
            broadcast_adapter,
            stream_adapter,
        }
    }

    /// Resolve, boot, compose, and signal readiness.
    ///
    /// On failure the kernel transitions to `error`, the already
    /// initialized prefix is torn down, and every later call rejects with
    /// the same error. No partial plugin surface is exposed on failure.
    pub async fn init(&self) -> Result<()> {
        let mut outcome = self.init_outcome.lock().await;
        if let Some(settled) = &*outcome {
            return settled.clone();
        }

        *self.state.write() = KernelState::Initializing;
        let result = self.boot().await;
        match &result {
            Ok(()) => *self.state.write() = KernelState::Initialized,
            Err(err) => {
                log::error!("kernel init failed: {err}");
                *self.state.write() = KernelState::Error;
            }
        }
        *outcome = Some(result.clone());
        result
    }

    async fn boot(&self) -> Result<()> {
        let events = &self.ctx.events;

        // Kernel-reserved addresses: boot events buffer until readiness.
        let boot_definition = EventDefinition {
            delivery: DeliveryMode::Sync,
            startup: StartupPolicy::Buffer(KERNEL_EVENT_BUFFER),
        };
        events.define_event(KERNEL_NAMESPACE, PLUGIN_LOADED_EVENT, boot_definition.clone());
        events.define_event(KERNEL_NAMESPACE, PLUGIN_FAILED_EVENT, boot_definition);
        self.ctx
            .errors
            .define_errors(KERNEL_NAMESPACE, &[MULTIPLE_AUGMENTS_KIND]);

        // Resolver: order, chosen instances, constraint graph.
        let resolution = self
            .resolver
            .resolve(&self.registry, self.pending_conflicts.clone())
            .map_err(KernelError::from)?;
        for warning in &resolution.warnings {
            log::warn!("resolution warning [{}]: {warning}", warning.code());
        }

        // Bus declarations, in resolved order.
        for name in &resolution.order {
            let Some(plugin) = resolution.plugins.get(name) else { continue };
            for decl in plugin.event_decls() {
                events.define_event(
                    &decl.namespace,
                    &decl.key,
                    EventDefinition { delivery: decl.delivery, startup: decl.startup },
                );
            }
            for decl in plugin.hook_decls() {
                self.ctx.hooks.define(&decl.namespace, &decl.key);
            }
            for namespace in plugin.alert_namespaces() {
                self.ctx.alerts.declare_namespace(namespace);
            }
            for decl in plugin.error_decls() {
                let kinds: Vec<&str> = decl.kinds.iter().map(String::as_str).collect();
                self.ctx.errors.define_errors(&decl.namespace, &kinds);
            }
        }

        // Lifecycle boot phases.
        let loaded = self
            .engine
            .run_init(&resolution.order, &resolution.plugins, &resolution.graph, &self.ctx)
            .await
            .map_err(KernelError::from)?;

        // Setup pass: every plugin's own API, in resolved order.
        let mut setups: HashMap<String, ApiDefinition> = HashMap::new();
        for name in &loaded {
            let Some(plugin) = resolution.plugins.get(name) else { continue };
            let setup_ctx = SetupContext {
                plugin: name.clone(),
                kernel: Arc::clone(&self.ctx),
            };
            match (plugin.setup_fn())(setup_ctx).await {
                Ok(api) => {
                    setups.insert(name.clone(), api);
                }
                Err(source) => {
                    let err = PluginSystemError::SetupFailed {
                        plugin: name.clone(),
                        source,
                    };
                    log::error!("boot aborted: {err}");
                    self.engine
                        .run_destroy(&loaded, &resolution.plugins, &resolution.graph, &self.ctx)
                        .await;
                    return Err(err.into());
                }
            }
        }

        // Augmentation merge, then seal and publish.
        let apis = AugmentationMerger::merge(
            &resolution.order,
            &resolution.plugins,
            setups,
            &self.ctx.errors,
        )
        .await;
        *self.apis.write() = apis;
        *self.loaded.write() = loaded;
        *self.resolved.write() = Some(ResolvedState {
            order: resolution.order,
            plugins: resolution.plugins,
            graph: resolution.graph,
        });

        // Ready: start the bus and replay startup buffers.
        events.start().await;
        Ok(())
    }

    /// Run the destroy phases in exact reverse init order. Idempotent
    /// after completion, a no-op before `init`, and tolerant of teardown
    /// errors (reported on the error bus, never re-thrown).
    pub async fn destroy(&self) -> Result<()> {
        let current = *self.state.read();
        match current {
            KernelState::Uninitialized | KernelState::Building | KernelState::Destroyed => {
                return Ok(());
            }
            // An aborted boot already tore down its prefix.
            KernelState::Error => return Ok(()),
            KernelState::Initialized => {}
            KernelState::Initializing | KernelState::Destroying => {
                return Err(KernelError::invalid_state(KernelState::Initialized, current));
            }
        }

        *self.state.write() = KernelState::Destroying;

        let loaded: Vec<String> = self.loaded.read().clone();
        let (plugins, graph) = {
            let resolved = self.resolved.read();
            match &*resolved {
                Some(state) => (state.plugins.clone(), state.graph.clone()),
                None => (HashMap::new(), ConstraintGraph::new()),
            }
        };
        self.engine.run_destroy(&loaded, &plugins, &graph, &self.ctx).await;

        self.ctx.events.destroy();
        self.loaded.write().clear();
        *self.state.write() = KernelState::Destroyed;
        Ok(())
    }

    pub fn state(&self) -> KernelState {
        *self.state.read()
    }

    /// Ordered names of plugins whose `init` succeeded.
    pub fn loaded_plugins(&self) -> Vec<String> {
        self.loaded.read().clone()
    }

    /// The frozen merged API of one plugin; `None` until initialized.
    pub fn plugin_api(&self, name: &str) -> Option<Arc<ApiHandle>> {
        self.apis.read().get(name).cloned()
    }

    /// Snapshot of every published plugin API, keyed by plugin name.
    pub fn plugins(&self) -> HashMap<String, Arc<ApiHandle>> {
        self.apis.read().clone()
    }

    /// The resolved init order, once `init` has succeeded.
    pub fn resolved_order(&self) -> Option<Vec<String>> {
        self.resolved.read().as_ref().map(|state| state.order.clone())
    }

    pub fn events(&self) -> EventBus {
        self.ctx.events.clone()
    }

    pub fn hooks(&self) -> HookBus {
        self.ctx.hooks.clone()
    }

    pub fn alerts(&self) -> AlertBus {
        self.ctx.alerts.clone()
    }

    pub fn errors(&self) -> ErrorBus {
        self.ctx.errors.clone()
    }

    pub fn recovery(&self) -> Arc<RecoveryManager> {
        Arc::clone(&self.ctx.recovery)
    }

    /// The shared context handed to plugin callbacks.
    pub fn context(&self) -> Arc<KernelContext> {
        Arc::clone(&self.ctx)
    }

    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// The broadcast adapter, when wired via `events.adapters`.
    pub fn broadcast_adapter(&self) -> Option<Arc<BroadcastAdapter>> {
        self.broadcast_adapter.clone()
    }

    /// The stream adapter, when wired via `events.adapters`.
    pub fn stream_adapter(&self) -> Option<Arc<StreamAdapter>> {
        self.stream_adapter.clone()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("state", &self.state())
            .field("plugins", &self.registry.plugin_count())
            .finish_non_exhaustive()
    }
}
