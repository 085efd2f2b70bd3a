use std::collections::HashMap;

use serde::Deserialize;

use crate::lifecycle::{LifecyclePhase, PhasePolicy};
use crate::plugin_system::resolver::ResolveStrategy;
use crate::recovery::RecoveryOptions;

/// Resolver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    pub strategy: ResolveStrategy,
}

/// Lifecycle engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LifecycleOptions {
    /// Max concurrent plugins per topological level.
    pub concurrency: usize,
    /// Per-phase timeout/retry policies.
    pub policies: HashMap<LifecyclePhase, PhasePolicy>,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            policies: HashMap::new(),
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventOptions {
    /// Reject emits for undeclared addresses.
    pub strict: bool,
    /// Observer adapters to wire in ("broadcast", "stream").
    pub adapters: Vec<String>,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            strict: true,
            adapters: Vec::new(),
        }
    }
}

/// The recognized kernel options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KernelOptions {
    pub resolver: ResolverOptions,
    pub lifecycle: LifecycleOptions,
    pub events: EventOptions,
    pub recovery: RecoveryOptions,
}
