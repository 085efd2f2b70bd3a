use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;

use crate::error_bus::ErrorReport;
use crate::kernel::context::KernelContext;
use crate::kernel::{KERNEL_NAMESPACE, PLUGIN_FAILED_EVENT, PLUGIN_LOADED_EVENT};
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::{LifecyclePhase, PhasePolicy};
use crate::plugin_system::graph::ConstraintGraph;
use crate::plugin_system::plugin::{PhaseContext, Plugin};
use crate::plugin_system::sort::topological_levels;
use crate::utils::concurrency::parallel_map;
use crate::utils::timing::with_deadline;

/// Executes lifecycle phases across the resolved plugin order.
///
/// Phases run phase-major: every plugin finishes `beforeInit` before any
/// `init` starts, and so on. With a concurrency limit above 1 the engine
/// groups plugins into topological levels, so the happens-before relation
/// of the constraint graph is preserved while unrelated plugins run
/// concurrently.
pub struct LifecycleEngine {
    policies: HashMap<LifecyclePhase, PhasePolicy>,
    concurrency: usize,
}

impl LifecycleEngine {
    pub fn new(policies: HashMap<LifecyclePhase, PhasePolicy>, concurrency: usize) -> Self {
        Self {
            policies,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// The policy configured for `phase`; defaults apply otherwise.
    pub fn policy(&self, phase: LifecyclePhase) -> PhasePolicy {
        self.policies.get(&phase).cloned().unwrap_or_default()
    }

    /// Run `beforeInit → init → afterInit` across the resolved order.
    ///
    /// Emits `pluginLoaded {name}` after each plugin's `afterInit`. On a
    /// phase failure the boot aborts: `pluginFailed {name, error}` is
    /// emitted, the plugins whose `init` already succeeded are torn down
    /// in reverse (errors reported, never re-thrown), and the failure is
    /// returned. On success, returns the loaded names in init order.
    pub async fn run_init(
        &self,
        order: &[String],
        plugins: &HashMap<String, Arc<Plugin>>,
        graph: &ConstraintGraph,
        ctx: &Arc<KernelContext>,
    ) -> Result<Vec<String>, LifecycleError> {
        let levels = self.levels_for(order, graph);
        let mut init_succeeded: Vec<String> = Vec::new();

        for phase in LifecyclePhase::INIT_PHASES {
            let emit_loaded = phase == LifecyclePhase::AfterInit;
            match self.run_phase(&levels, plugins, ctx, phase, false, emit_loaded).await {
                Ok(done) => {
                    if phase == LifecyclePhase::Init {
                        init_succeeded = done;
                    }
                }
                Err((err, done_so_far)) => {
                    if phase == LifecyclePhase::Init {
                        init_succeeded = done_so_far;
                    }
                    let _ = ctx
                        .events
                        .emit(
                            KERNEL_NAMESPACE,
                            PLUGIN_FAILED_EVENT,
                            json!({ "name": err.plugin(), "error": err.to_string() }),
                        )
                        .await;
                    log::error!("boot aborted: {err}");
                    self.run_destroy(&init_succeeded, plugins, graph, ctx).await;
                    return Err(err);
                }
            }
        }

        Ok(order.to_vec())
    }

    /// Run `beforeDestroy → destroy → afterDestroy` over `loaded`
    /// (given in init order) in exact reverse order. Teardown is
    /// error-tolerant: failures are reported on the error bus and the
    /// remaining plugins still go down.
    pub async fn run_destroy(
        &self,
        loaded: &[String],
        plugins: &HashMap<String, Arc<Plugin>>,
        graph: &ConstraintGraph,
        ctx: &Arc<KernelContext>,
    ) {
        if loaded.is_empty() {
            return;
        }
        let levels = self.destroy_levels(loaded, graph);
        for phase in LifecyclePhase::DESTROY_PHASES {
            // Tolerant runs never return Err.
            let _ = self.run_phase(&levels, plugins, ctx, phase, true, false).await;
        }
    }

    /// Execution levels for the init direction, restricted to `order`.
    /// With sequential concurrency every plugin is its own level, so the
    /// canonical resolved order is followed exactly.
    fn levels_for(&self, order: &[String], graph: &ConstraintGraph) -> Vec<Vec<String>> {
        if self.concurrency <= 1 {
            return order.iter().map(|name| vec![name.clone()]).collect();
        }
        let index: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        topological_levels(graph, &index)
            .into_iter()
            .map(|level| level.into_iter().filter(|n| index.contains_key(n)).collect())
            .filter(|level: &Vec<String>| !level.is_empty())
            .collect()
    }

    /// Levels for teardown: the init levels restricted to `loaded`,
    /// reversed, with each level's members reversed as well.
    fn destroy_levels(&self, loaded: &[String], graph: &ConstraintGraph) -> Vec<Vec<String>> {
        let keep: HashSet<&String> = loaded.iter().collect();
        let mut levels = self.levels_for(loaded, graph);
        levels.retain_mut(|level| {
            level.retain(|name| keep.contains(name));
            !level.is_empty()
        });
        levels.reverse();
        for level in &mut levels {
            level.reverse();
        }
        levels
    }

    /// Run one phase across the given levels. Returns the names that
    /// completed the phase; on failure (non-tolerant), the error plus the
    /// successes so far. In tolerant mode failures are reported on the
    /// error bus and never abort.
    async fn run_phase(
        &self,
        levels: &[Vec<String>],
        plugins: &HashMap<String, Arc<Plugin>>,
        ctx: &Arc<KernelContext>,
        phase: LifecyclePhase,
        tolerant: bool,
        emit_loaded: bool,
    ) -> Result<Vec<String>, (LifecycleError, Vec<String>)> {
        let policy = self.policy(phase);
        let mut succeeded: Vec<String> = Vec::new();

        for level in levels {
            let results = parallel_map(level.clone(), self.concurrency, |_, name: String| {
                let policy = policy.clone();
                async move {
                    let result = match plugins.get(&name) {
                        Some(plugin) => {
                            self.run_plugin_phase(plugin, phase, &policy, ctx).await
                        }
                        None => Ok(()),
                    };
                    if result.is_ok() && emit_loaded {
                        let _ = ctx
                            .events
                            .emit(KERNEL_NAMESPACE, PLUGIN_LOADED_EVENT, json!({ "name": name.as_str() }))
                            .await;
                    }
                    (name, result)
                }
            })
            .await;

            let mut first_failure: Option<LifecycleError> = None;
            for (name, result) in results {
                match result {
                    Ok(()) => succeeded.push(name),
                    Err(err) if tolerant => {
                        log::warn!("teardown error ignored: {err}");
                        ctx.errors
                            .report(
                                ErrorReport::new(
                                    KERNEL_NAMESPACE,
                                    err.code(),
                                    err.to_string(),
                                )
                                .with_meta(json!({ "plugin": name, "phase": phase.as_str() }))
                                .with_cause(err),
                            )
                            .await;
                    }
                    Err(err) => {
                        if first_failure.is_none() {
                            first_failure = Some(err);
                        }
                    }
                }
            }
            if let Some(err) = first_failure {
                return Err((err, succeeded));
            }
        }
        Ok(succeeded)
    }

    /// One plugin, one phase: up to `retry + 1` attempts, each bounded by
    /// the policy deadline. A missing phase function is success. Timeouts
    /// abandon the in-flight attempt and surface as that attempt's error;
    /// the exhausted result is wrapped as a phase failure naming the
    /// plugin, phase, and cause.
    async fn run_plugin_phase(
        &self,
        plugin: &Arc<Plugin>,
        phase: LifecyclePhase,
        policy: &PhasePolicy,
        ctx: &Arc<KernelContext>,
    ) -> Result<(), LifecycleError> {
        let Some(phase_fn) = plugin.phase_fn(phase) else {
            return Ok(());
        };

        let name = plugin.name().to_string();
        let mut last_error: Option<LifecycleError> = None;

        for attempt in 0..policy.attempts() {
            let call = {
                let f = Arc::clone(phase_fn);
                let phase_ctx = PhaseContext {
                    plugin: name.clone(),
                    phase,
                    kernel: Arc::clone(ctx),
                };
                async move { f(phase_ctx).await }
            };

            let outcome = match policy.timeout() {
                Some(deadline) => match with_deadline(deadline, call).await {
                    Ok(result) => result.map_err(|cause| LifecycleError::PhaseFailed {
                        plugin: name.clone(),
                        phase,
                        cause,
                    }),
                    Err(_) => Err(LifecycleError::PhaseTimeout {
                        plugin: name.clone(),
                        phase,
                        timeout: deadline,
                    }),
                },
                None => call.await.map_err(|cause| LifecycleError::PhaseFailed {
                    plugin: name.clone(),
                    phase,
                    cause,
                }),
            };

            match outcome {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if attempt + 1 < policy.attempts() {
                        log::warn!(
                            "phase '{phase}' of plugin '{name}' failed on attempt {} ({err}); retrying",
                            attempt + 1
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        // Exhausted. Timeouts wrap into the phase failure as its cause.
        match last_error {
            Some(err @ LifecycleError::PhaseFailed { .. }) => Err(err),
            Some(timeout @ LifecycleError::PhaseTimeout { .. }) => {
                Err(LifecycleError::PhaseFailed {
                    plugin: name,
                    phase,
                    cause: Box::new(timeout),
                })
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("concurrency", &self.concurrency)
            .field("policies", &self.policies)
            .finish()
    }
}
