use std::sync::Arc;

use crate::alert::AlertBus;
use crate::error_bus::ErrorBus;
use crate::event::adapter::{BroadcastAdapter, StreamAdapter};
use crate::event::EventBus;
use crate::hook::HookBus;
use crate::kernel::bootstrap::Kernel;
use crate::kernel::context::KernelContext;
use crate::kernel::options::KernelOptions;
use crate::lifecycle::LifecycleEngine;
use crate::plugin_system::plugin::Plugin;
use crate::plugin_system::registry::{PluginOrder, PluginRegistry};
use crate::plugin_system::resolver::{Conflict, DependencyResolver, ResolveStrategy};
use crate::recovery::RecoveryManager;

/// Entry point: a fresh kernel builder.
pub fn create_kernel() -> KernelBuilder {
    KernelBuilder::new()
}

/// Fluent kernel composer: `.use_plugin(..)` registrations plus
/// `.with_options(..)`, materialized by `.build()`.
///
/// Registration conflicts (duplicate names under strict/permissive) are
/// deferred and surface from `init`, where all resolver errors belong.
pub struct KernelBuilder {
    pending: Vec<(Plugin, Option<PluginOrder>)>,
    options: KernelOptions,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            options: KernelOptions::default(),
        }
    }

    /// Register a plugin.
    pub fn use_plugin(mut self, plugin: Plugin) -> Self {
        self.pending.push((plugin, None));
        self
    }

    /// Register a plugin with user ordering directives.
    pub fn use_plugin_with(mut self, plugin: Plugin, order: PluginOrder) -> Self {
        self.pending.push((plugin, Some(order)));
        self
    }

    pub fn with_options(mut self, options: KernelOptions) -> Self {
        self.options = options;
        self
    }

    /// Materialize the kernel in the `building` state.
    pub fn build(self) -> Kernel {
        let strategy = self.options.resolver.strategy;
        let mut registry = PluginRegistry::new();
        let mut pending_conflicts = Vec::new();

        for (plugin, order) in self.pending {
            match strategy {
                ResolveStrategy::Auto => registry.register_candidate(plugin, order),
                _ => {
                    let name = plugin.name().to_string();
                    if registry.register(plugin, order).is_err() {
                        pending_conflicts.push(Conflict::DuplicatePlugin { name });
                    }
                }
            }
        }

        let errors = ErrorBus::new();
        let events = EventBus::new(self.options.events.strict, errors.clone());

        let mut broadcast_adapter = None;
        let mut stream_adapter = None;
        for adapter in &self.options.events.adapters {
            match adapter.as_str() {
                "broadcast" | "node" => {
                    let adapter = Arc::new(BroadcastAdapter::new(128));
                    events.add_adapter(adapter.clone());
                    broadcast_adapter = Some(adapter);
                }
                "stream" | "rx" => {
                    let adapter = Arc::new(StreamAdapter::new());
                    events.add_adapter(adapter.clone());
                    stream_adapter = Some(adapter);
                }
                other => log::warn!("unknown event adapter '{other}' ignored"),
            }
        }

        let hooks = HookBus::new(errors.clone());
        let alerts = AlertBus::new();
        let recovery = Arc::new(RecoveryManager::new(self.options.recovery.clone()));
        let ctx = Arc::new(KernelContext {
            events,
            hooks,
            alerts,
            errors,
            recovery,
        });

        let engine = LifecycleEngine::new(
            self.options.lifecycle.policies.clone(),
            self.options.lifecycle.concurrency,
        );
        let resolver = DependencyResolver::new(strategy);

        Kernel::new(
            self.options,
            registry,
            pending_conflicts,
            ctx,
            engine,
            resolver,
            broadcast_adapter,
            stream_adapter,
        )
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
