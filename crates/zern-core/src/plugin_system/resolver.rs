use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::plugin_system::graph::{ConstraintGraph, EdgeKind};
use crate::plugin_system::plugin::Plugin;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::sort::stable_topological_sort;
use crate::plugin_system::version::{compare_versions, ConstraintSet, Version};

/// Conflict handling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    /// Any conflict is fatal.
    #[default]
    Strict,
    /// Version and hint conflicts downgrade to warnings; an order is
    /// still returned.
    Permissive,
    /// Permissive, plus the highest compatible version candidate wins
    /// when multiple versions of one name are registered.
    Auto,
}

/// A single resolution conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// A non-optional dependency is not registered.
    MissingDependency { plugin: String, dependency: String },
    /// The constraint graph contains a cycle.
    DependencyCycle { path: Vec<String> },
    /// A declared range is not satisfied by the resolved version.
    VersionUnsatisfied {
        plugin: String,
        dependency: String,
        required: String,
        actual: String,
    },
    /// A range or actual version string does not parse.
    InvalidVersionSpec {
        plugin: String,
        dependency: Option<String>,
        detail: String,
    },
    /// A second plugin was registered under an existing name.
    DuplicatePlugin { name: String },
    /// A cycle that disappears once hint edges are removed; the hints
    /// were dropped to recover an order.
    HintCycle { path: Vec<String> },
}

impl Conflict {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Conflict::MissingDependency { .. } => "DependencyMissing",
            Conflict::DependencyCycle { .. } => "DependencyCycle",
            Conflict::VersionUnsatisfied { .. } => "VersionUnsatisfied",
            Conflict::InvalidVersionSpec { .. } => "InvalidVersionSpec",
            Conflict::DuplicatePlugin { .. } => "DuplicatePlugin",
            Conflict::HintCycle { .. } => "HintCycle",
        }
    }

    /// Whether this conflict aborts resolution under `strategy`.
    ///
    /// Missing dependencies, true cycles, and duplicate names are never
    /// downgraded; version-class and hint-class conflicts become warnings
    /// outside strict mode.
    pub fn is_fatal(&self, strategy: ResolveStrategy) -> bool {
        match self {
            Conflict::MissingDependency { .. }
            | Conflict::DependencyCycle { .. }
            | Conflict::DuplicatePlugin { .. } => true,
            Conflict::VersionUnsatisfied { .. }
            | Conflict::InvalidVersionSpec { .. }
            | Conflict::HintCycle { .. } => strategy == ResolveStrategy::Strict,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::MissingDependency { plugin, dependency } => {
                write!(f, "plugin '{plugin}' requires missing plugin '{dependency}'")
            }
            Conflict::DependencyCycle { path } => {
                write!(f, "dependency cycle: {}", path.join(" -> "))
            }
            Conflict::VersionUnsatisfied {
                plugin,
                dependency,
                required,
                actual,
            } => write!(
                f,
                "plugin '{plugin}' requires '{dependency}' version '{required}' but found '{actual}'"
            ),
            Conflict::InvalidVersionSpec { plugin, dependency, detail } => match dependency {
                Some(dependency) => write!(
                    f,
                    "invalid version spec on '{plugin}' -> '{dependency}': {detail}"
                ),
                None => write!(f, "invalid version spec on '{plugin}': {detail}"),
            },
            Conflict::DuplicatePlugin { name } => {
                write!(f, "plugin '{name}' is registered more than once")
            }
            Conflict::HintCycle { path } => write!(
                f,
                "load hints form a cycle and were dropped: {}",
                path.join(" -> ")
            ),
        }
    }
}

/// Aggregated fatal conflicts. The resolver never partially succeeds: on
/// any fatal conflict the whole report comes back instead of an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency resolution failed: {}", .conflicts.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("; "))]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    /// The first conflict's stable code, for single-cause reporting.
    pub fn primary_code(&self) -> &'static str {
        self.conflicts.first().map(Conflict::code).unwrap_or("DependencyConflict")
    }
}

/// Successful resolution output: the canonical init order, the chosen
/// plugin instances, the (possibly hint-degraded) constraint graph, and
/// any downgraded warnings.
#[derive(Debug)]
pub struct Resolution {
    pub order: Vec<String>,
    pub plugins: HashMap<String, Arc<Plugin>>,
    pub graph: ConstraintGraph,
    pub warnings: Vec<Conflict>,
}

/// Builds the constraint graph from plugins, user order, and hints, runs
/// the stable sort, and validates version ranges.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    strategy: ResolveStrategy,
}

impl DependencyResolver {
    pub fn new(strategy: ResolveStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ResolveStrategy {
        self.strategy
    }

    /// Resolve the registry into an init order or a conflict report.
    ///
    /// `pending` carries conflicts detected before resolution proper
    /// (duplicate registrations observed by the builder).
    pub fn resolve(
        &self,
        registry: &PluginRegistry,
        pending: Vec<Conflict>,
    ) -> Result<Resolution, ConflictReport> {
        let mut conflicts: Vec<Conflict> = pending;
        let mut warnings: Vec<Conflict> = Vec::new();

        let chosen = self.select_candidates(registry, &mut warnings);
        let plugins: HashMap<String, Arc<Plugin>> = chosen
            .iter()
            .map(|p| (p.name().to_string(), Arc::clone(p)))
            .collect();

        // 1. Nodes, in registration order.
        let mut graph = ConstraintGraph::new();
        for plugin in &chosen {
            graph.add_node(plugin.name());
        }

        // 2. Dependency edges (dependency -> dependent); missing
        //    non-optional dependencies become conflicts.
        for plugin in &chosen {
            for dep in plugin.dependencies() {
                if plugins.contains_key(&dep.plugin_name) {
                    graph.add_edge(&dep.plugin_name, plugin.name(), EdgeKind::Dep);
                } else if !dep.optional {
                    conflicts.push(Conflict::MissingDependency {
                        plugin: plugin.name().to_string(),
                        dependency: dep.plugin_name.clone(),
                    });
                }
            }
        }

        // 3. User ordering edges.
        for (name, order) in registry.user_orders() {
            for target in &order.before {
                graph.add_edge(name, target, EdgeKind::User);
            }
            for target in &order.after {
                graph.add_edge(target, name, EdgeKind::User);
            }
        }

        // 4. Hint edges. Hints naming unregistered plugins are dropped.
        for plugin in &chosen {
            for target in plugin.load_before() {
                graph.add_edge(plugin.name(), target, EdgeKind::Hint);
            }
            for target in plugin.load_after() {
                graph.add_edge(target, plugin.name(), EdgeKind::Hint);
            }
        }

        // 5. Stable sort; the sorter's partial output is never used.
        let (order, graph) = match stable_topological_sort(&graph) {
            Ok(order) => (Some(order), graph),
            Err(cycle) if self.strategy != ResolveStrategy::Strict => {
                // Retry without hint edges: a cycle that dissolves was a
                // hint conflict and is downgraded.
                let degraded = graph.without_edges(EdgeKind::Hint);
                match stable_topological_sort(&degraded) {
                    Ok(order) => {
                        log::warn!(
                            "load hints formed a cycle ({}); hints dropped",
                            cycle.path.join(" -> ")
                        );
                        warnings.push(Conflict::HintCycle { path: cycle.path });
                        (Some(order), degraded)
                    }
                    Err(hard) => {
                        conflicts.push(Conflict::DependencyCycle { path: hard.path });
                        (None, degraded)
                    }
                }
            }
            Err(cycle) => {
                conflicts.push(Conflict::DependencyCycle { path: cycle.path });
                (None, graph)
            }
        };

        // 6. Version validation, only meaningful once an order exists.
        if order.is_some() {
            for plugin in &chosen {
                for dep in plugin.dependencies() {
                    let Some(range) = &dep.version_range else { continue };
                    let Some(target) = plugins.get(&dep.plugin_name) else { continue };
                    let found = match (ConstraintSet::parse(range), Version::parse(target.version())) {
                        (Ok(set), Ok(actual)) => {
                            if set.satisfies(&actual) {
                                continue;
                            }
                            Conflict::VersionUnsatisfied {
                                plugin: plugin.name().to_string(),
                                dependency: dep.plugin_name.clone(),
                                required: range.clone(),
                                actual: target.version().to_string(),
                            }
                        }
                        (Err(err), _) => Conflict::InvalidVersionSpec {
                            plugin: plugin.name().to_string(),
                            dependency: Some(dep.plugin_name.clone()),
                            detail: err.to_string(),
                        },
                        (_, Err(err)) => Conflict::InvalidVersionSpec {
                            plugin: dep.plugin_name.clone(),
                            dependency: None,
                            detail: err.to_string(),
                        },
                    };
                    if found.is_fatal(self.strategy) {
                        conflicts.push(found);
                    } else {
                        log::warn!("resolution warning: {found}");
                        warnings.push(found);
                    }
                }
            }
        }

        // 7. All or nothing.
        let fatal: Vec<Conflict> = conflicts
            .into_iter()
            .filter(|c| c.is_fatal(self.strategy))
            .collect();
        if !fatal.is_empty() {
            return Err(ConflictReport { conflicts: fatal });
        }
        match order {
            Some(order) => Ok(Resolution { order, plugins, graph, warnings }),
            // A missing order without a fatal conflict cannot happen; the
            // cycle that suppressed it is always fatal.
            None => Err(ConflictReport {
                conflicts: vec![Conflict::DependencyCycle { path: Vec::new() }],
            }),
        }
    }

    /// Pick one instance per name. Under auto, the highest version
    /// candidate satisfying every declared constraint on that name wins.
    fn select_candidates(
        &self,
        registry: &PluginRegistry,
        warnings: &mut Vec<Conflict>,
    ) -> Vec<Arc<Plugin>> {
        if self.strategy != ResolveStrategy::Auto {
            return registry.list().to_vec();
        }

        // Every parsable constraint declared against each name.
        let mut constraints: HashMap<String, Vec<ConstraintSet>> = HashMap::new();
        for plugin in registry.list() {
            for candidate in registry.candidates_for(plugin.name()) {
                for dep in candidate.dependencies() {
                    if let Some(range) = &dep.version_range {
                        if let Ok(set) = ConstraintSet::parse(range) {
                            constraints.entry(dep.plugin_name.clone()).or_default().push(set);
                        }
                    }
                }
            }
        }

        registry
            .list()
            .iter()
            .map(|primary| {
                if !registry.has_candidates(primary.name()) {
                    return Arc::clone(primary);
                }
                let wanted = constraints.get(primary.name());
                let mut best: Option<(Version, Arc<Plugin>)> = None;
                for candidate in registry.candidates_for(primary.name()) {
                    let version = match Version::parse(candidate.version()) {
                        Ok(version) => version,
                        Err(err) => {
                            warnings.push(Conflict::InvalidVersionSpec {
                                plugin: candidate.name().to_string(),
                                dependency: None,
                                detail: err.to_string(),
                            });
                            continue;
                        }
                    };
                    let compatible = wanted
                        .map(|sets| sets.iter().all(|set| set.satisfies(&version)))
                        .unwrap_or(true);
                    if !compatible {
                        continue;
                    }
                    let better = match &best {
                        Some((current, _)) => {
                            compare_versions(&version, current) == std::cmp::Ordering::Greater
                        }
                        None => true,
                    };
                    if better {
                        best = Some((version, candidate));
                    }
                }
                match best {
                    Some((_, plugin)) => plugin,
                    // No candidate satisfies everything; keep the primary
                    // and let version validation report it.
                    None => Arc::clone(primary),
                }
            })
            .collect()
    }
}
