use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;

use crate::event::{DeliveryMode, StartupPolicy};
use crate::kernel::context::KernelContext;
use crate::lifecycle::LifecyclePhase;
use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::error::{DynError, PluginSystemError};

/// An invocable API method: JSON payload in, JSON payload out.
pub type ApiMethod = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, DynError>> + Send + Sync>;

/// The method map a plugin's `setup` produces.
pub type ApiDefinition = HashMap<String, ApiMethod>;

/// Wrap an async closure as an [`ApiMethod`].
pub fn api_method<F, Fut>(f: F) -> ApiMethod
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, DynError>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// Fluent helper for assembling an [`ApiDefinition`].
#[derive(Default)]
pub struct Api {
    methods: ApiDefinition,
}

impl Api {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, DynError>> + Send + 'static,
    {
        self.methods.insert(name.to_string(), api_method(f));
        self
    }

    pub fn build(self) -> ApiDefinition {
        self.methods
    }
}

#[derive(Default)]
struct ApiState {
    methods: HashMap<String, ApiMethod>,
    sealed: bool,
}

/// The runtime-typed public surface of a plugin.
///
/// A method map that the kernel composes (own `setup` output plus
/// augmentation contributions) and then seals; once sealed, the surface
/// is immutable for the rest of the kernel's life.
pub struct ApiHandle {
    plugin: String,
    state: RwLock<ApiState>,
}

impl ApiHandle {
    pub(crate) fn new(plugin: &str, methods: ApiDefinition) -> Self {
        Self {
            plugin: plugin.to_string(),
            state: RwLock::new(ApiState { methods, sealed: false }),
        }
    }

    /// The owning plugin's name.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Insert or replace a method. Returns whether an existing method was
    /// replaced. Fails once the surface is sealed.
    pub(crate) fn insert(&self, name: &str, method: ApiMethod) -> Result<bool, PluginSystemError> {
        let mut state = self.state.write();
        if state.sealed {
            return Err(PluginSystemError::SealedApi {
                plugin: self.plugin.clone(),
                method: name.to_string(),
            });
        }
        Ok(state.methods.insert(name.to_string(), method).is_some())
    }

    /// Seal the surface. Idempotent.
    pub(crate) fn seal(&self) {
        self.state.write().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.state.read().sealed
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.state.read().methods.contains_key(name)
    }

    /// Method names, sorted for deterministic enumeration.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke a method by name.
    pub async fn invoke(&self, method: &str, payload: Value) -> Result<Value, PluginSystemError> {
        let found = self.state.read().methods.get(method).cloned();
        let callable = found.ok_or_else(|| PluginSystemError::UnknownApiMethod {
            plugin: self.plugin.clone(),
            method: method.to_string(),
        })?;
        callable(payload)
            .await
            .map_err(|source| PluginSystemError::ApiMethodFailed {
                plugin: self.plugin.clone(),
                method: method.to_string(),
                source,
            })
    }
}

impl fmt::Debug for ApiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ApiHandle")
            .field("plugin", &self.plugin)
            .field("methods", &state.methods.len())
            .field("sealed", &state.sealed)
            .finish()
    }
}

/// Context handed to lifecycle phase functions.
#[derive(Clone)]
pub struct PhaseContext {
    pub plugin: String,
    pub phase: LifecyclePhase,
    pub kernel: Arc<KernelContext>,
}

/// Context handed to a plugin's `setup`.
#[derive(Clone)]
pub struct SetupContext {
    pub plugin: String,
    pub kernel: Arc<KernelContext>,
}

/// Context handed to augmentation factories at merge time.
///
/// `augmenter_api` is the augmenting plugin's own (possibly still
/// growing) surface, so contributed methods can close over it.
#[derive(Clone)]
pub struct AugmentContext {
    pub augmenter: String,
    pub target: String,
    pub augmenter_api: Arc<ApiHandle>,
}

/// A lifecycle phase function.
pub type PhaseFn = Arc<dyn Fn(PhaseContext) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;

/// A plugin's `setup` function.
pub type SetupFn =
    Arc<dyn Fn(SetupContext) -> BoxFuture<'static, Result<ApiDefinition, DynError>> + Send + Sync>;

/// Factory producing the methods an augmentation contributes, invoked at
/// merge time with the augmenter's own API in scope.
pub type AugmentFn = Arc<dyn Fn(&AugmentContext) -> ApiDefinition + Send + Sync>;

/// A declared contribution to another plugin's public API.
#[derive(Clone)]
pub struct Augmentation {
    pub target: String,
    pub build: AugmentFn,
}

impl fmt::Debug for Augmentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Augmentation").field("target", &self.target).finish_non_exhaustive()
    }
}

/// An event declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecl {
    pub namespace: String,
    pub key: String,
    pub delivery: DeliveryMode,
    pub startup: StartupPolicy,
}

/// A hook key declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDecl {
    pub namespace: String,
    pub key: String,
}

/// An error namespace with its kinds, declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDecl {
    pub namespace: String,
    pub kinds: Vec<String>,
}

/// One optional function per lifecycle phase, indexed by
/// [`LifecyclePhase`]. Replaces name-based reflection on the plugin
/// instance.
#[derive(Default)]
pub(crate) struct PhaseTable {
    before_init: Option<PhaseFn>,
    init: Option<PhaseFn>,
    after_init: Option<PhaseFn>,
    before_destroy: Option<PhaseFn>,
    destroy: Option<PhaseFn>,
    after_destroy: Option<PhaseFn>,
}

impl PhaseTable {
    fn get(&self, phase: LifecyclePhase) -> Option<&PhaseFn> {
        match phase {
            LifecyclePhase::BeforeInit => self.before_init.as_ref(),
            LifecyclePhase::Init => self.init.as_ref(),
            LifecyclePhase::AfterInit => self.after_init.as_ref(),
            LifecyclePhase::BeforeDestroy => self.before_destroy.as_ref(),
            LifecyclePhase::Destroy => self.destroy.as_ref(),
            LifecyclePhase::AfterDestroy => self.after_destroy.as_ref(),
        }
    }

    fn set(&mut self, phase: LifecyclePhase, f: PhaseFn) {
        let slot = match phase {
            LifecyclePhase::BeforeInit => &mut self.before_init,
            LifecyclePhase::Init => &mut self.init,
            LifecyclePhase::AfterInit => &mut self.after_init,
            LifecyclePhase::BeforeDestroy => &mut self.before_destroy,
            LifecyclePhase::Destroy => &mut self.destroy,
            LifecyclePhase::AfterDestroy => &mut self.after_destroy,
        };
        *slot = Some(f);
    }
}

/// Fine-grained plugin state, mirroring the kernel states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Registered,
    Initializing,
    Initialized,
    Destroying,
    Destroyed,
    Error,
}

/// A plugin: a stable name, a version, declarations, and behavior.
///
/// Plugins have no identity beyond their name. The version is kept as its
/// raw string; the resolver validates it together with the declared
/// ranges.
pub struct Plugin {
    name: String,
    version: String,
    dependencies: Vec<PluginDependency>,
    load_before: Vec<String>,
    load_after: Vec<String>,
    augments: Vec<Augmentation>,
    events: Vec<EventDecl>,
    hooks: Vec<HookDecl>,
    alert_namespaces: Vec<String>,
    errors: Vec<ErrorDecl>,
    setup: SetupFn,
    phases: PhaseTable,
}

impl Plugin {
    /// Start building a plugin with the given name and version string.
    pub fn builder(name: &str, version: &str) -> PluginBuilder {
        PluginBuilder::new(name, version)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw version string as declared.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn dependencies(&self) -> &[PluginDependency] {
        &self.dependencies
    }

    pub fn load_before(&self) -> &[String] {
        &self.load_before
    }

    pub fn load_after(&self) -> &[String] {
        &self.load_after
    }

    pub fn augments(&self) -> &[Augmentation] {
        &self.augments
    }

    pub fn event_decls(&self) -> &[EventDecl] {
        &self.events
    }

    pub fn hook_decls(&self) -> &[HookDecl] {
        &self.hooks
    }

    pub fn alert_namespaces(&self) -> &[String] {
        &self.alert_namespaces
    }

    pub fn error_decls(&self) -> &[ErrorDecl] {
        &self.errors
    }

    /// Look up the function for `phase`, if the plugin declared one.
    pub fn phase_fn(&self, phase: LifecyclePhase) -> Option<&PhaseFn> {
        self.phases.get(phase)
    }

    pub(crate) fn setup_fn(&self) -> &SetupFn {
        &self.setup
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("dependencies", &self.dependencies)
            .field("load_before", &self.load_before)
            .field("load_after", &self.load_after)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`Plugin`].
pub struct PluginBuilder {
    name: String,
    version: String,
    dependencies: Vec<PluginDependency>,
    load_before: Vec<String>,
    load_after: Vec<String>,
    augments: Vec<Augmentation>,
    events: Vec<EventDecl>,
    hooks: Vec<HookDecl>,
    alert_namespaces: Vec<String>,
    errors: Vec<ErrorDecl>,
    setup: Option<SetupFn>,
    phases: PhaseTable,
}

impl PluginBuilder {
    fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: Vec::new(),
            load_before: Vec::new(),
            load_after: Vec::new(),
            augments: Vec::new(),
            events: Vec::new(),
            hooks: Vec::new(),
            alert_namespaces: Vec::new(),
            errors: Vec::new(),
            setup: None,
            phases: PhaseTable::default(),
        }
    }

    /// Declare a dependency on another plugin.
    pub fn dependency(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Declare a required dependency with any version.
    pub fn depends_on(self, name: &str) -> Self {
        self.dependency(PluginDependency::required_any(name))
    }

    /// Declare a required dependency constrained to `range`.
    pub fn depends_on_version(self, name: &str, range: &str) -> Self {
        self.dependency(PluginDependency::required(name, range))
    }

    /// Hint that this plugin should load before the named plugins.
    pub fn load_before(mut self, names: &[&str]) -> Self {
        self.load_before.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Hint that this plugin should load after the named plugins.
    pub fn load_after(mut self, names: &[&str]) -> Self {
        self.load_after.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Contribute methods to another plugin's API. The factory runs at
    /// merge time with this plugin's own API in scope.
    pub fn augments<F>(mut self, target: &str, build: F) -> Self
    where
        F: Fn(&AugmentContext) -> ApiDefinition + Send + Sync + 'static,
    {
        self.augments.push(Augmentation {
            target: target.to_string(),
            build: Arc::new(build),
        });
        self
    }

    /// Declare an event on the bus.
    pub fn declare_event(
        mut self,
        namespace: &str,
        key: &str,
        delivery: DeliveryMode,
        startup: StartupPolicy,
    ) -> Self {
        self.events.push(EventDecl {
            namespace: namespace.to_string(),
            key: key.to_string(),
            delivery,
            startup,
        });
        self
    }

    /// Declare a hook key.
    pub fn declare_hook(mut self, namespace: &str, key: &str) -> Self {
        self.hooks.push(HookDecl {
            namespace: namespace.to_string(),
            key: key.to_string(),
        });
        self
    }

    /// Declare an alert namespace.
    pub fn declare_alerts(mut self, namespace: &str) -> Self {
        self.alert_namespaces.push(namespace.to_string());
        self
    }

    /// Declare an error namespace with its kinds.
    pub fn declare_errors(mut self, namespace: &str, kinds: &[&str]) -> Self {
        self.errors.push(ErrorDecl {
            namespace: namespace.to_string(),
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
        });
        self
    }

    /// The plugin's `setup`, producing its public API.
    pub fn setup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SetupContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiDefinition, DynError>> + Send + 'static,
    {
        self.setup = Some(Arc::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    /// Install a function for an arbitrary phase.
    pub fn on_phase<F, Fut>(mut self, phase: LifecyclePhase, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.phases.set(phase, Arc::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    pub fn on_before_init<F, Fut>(self, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.on_phase(LifecyclePhase::BeforeInit, f)
    }

    pub fn on_init<F, Fut>(self, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.on_phase(LifecyclePhase::Init, f)
    }

    pub fn on_after_init<F, Fut>(self, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.on_phase(LifecyclePhase::AfterInit, f)
    }

    pub fn on_before_destroy<F, Fut>(self, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.on_phase(LifecyclePhase::BeforeDestroy, f)
    }

    pub fn on_destroy<F, Fut>(self, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.on_phase(LifecyclePhase::Destroy, f)
    }

    pub fn on_after_destroy<F, Fut>(self, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.on_phase(LifecyclePhase::AfterDestroy, f)
    }

    /// Finish the plugin. Fails on an empty name or missing `setup`.
    pub fn build(self) -> Result<Plugin, PluginSystemError> {
        if self.name.trim().is_empty() {
            return Err(PluginSystemError::InvalidDefinition {
                message: "plugin name must be non-empty".to_string(),
            });
        }
        let setup = self.setup.ok_or_else(|| PluginSystemError::InvalidDefinition {
            message: format!("plugin '{}' declares no setup", self.name),
        })?;
        Ok(Plugin {
            name: self.name,
            version: self.version,
            dependencies: self.dependencies,
            load_before: self.load_before,
            load_after: self.load_after,
            augments: self.augments,
            events: self.events,
            hooks: self.hooks,
            alert_namespaces: self.alert_namespaces,
            errors: self.errors,
            setup,
            phases: self.phases,
        })
    }
}
