//! # Zern Plugin System
//!
//! Everything the kernel needs to know about plugins before running them:
//! the plugin model, registration, dependency/order resolution, and API
//! composition.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`plugin`]**: the [`Plugin`] data model and [`PluginBuilder`]. A
//!   plugin carries a stable name, a version, declared dependencies and
//!   load hints, bus declarations, augmentations, a required `setup`, and
//!   an explicit table of optional lifecycle phase functions.
//! - **[`dependency`]**: the [`PluginDependency`] model.
//! - **[`version`]**: semantic versions and `||`-joined constraint sets.
//! - **[`graph`]**: the typed-edge constraint multigraph (dependency,
//!   user order, load hint) with in-degree counters.
//! - **[`sort`]**: the stable Kahn topological sorter with DFS cycle-path
//!   extraction and level grouping.
//! - **[`registry`]**: the insertion-ordered [`PluginRegistry`] plus user
//!   ordering directives.
//! - **[`resolver`]**: the [`DependencyResolver`] that turns the registry
//!   into the kernel's canonical init order or an aggregated
//!   [`ConflictReport`], under strict/permissive/auto strategies.
//! - **[`augment`]**: the two-pass [`AugmentationMerger`] composing each
//!   plugin's public surface.
//! - **[`error`]**: plugin-system error types.

pub mod augment;
pub mod dependency;
pub mod error;
pub mod graph;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod sort;
pub mod version;

// Re-export important types
pub use augment::AugmentationMerger;
pub use dependency::PluginDependency;
pub use error::{DynError, PluginSystemError};
pub use graph::{ConstraintGraph, Edge, EdgeKind};
pub use plugin::{
    api_method, Api, ApiDefinition, ApiHandle, ApiMethod, AugmentContext, Augmentation,
    EventDecl, ErrorDecl, HookDecl, PhaseContext, PhaseFn, Plugin, PluginBuilder, PluginState,
    SetupContext, SetupFn,
};
pub use registry::{PluginOrder, PluginRegistry};
pub use resolver::{Conflict, ConflictReport, DependencyResolver, Resolution, ResolveStrategy};
pub use sort::{stable_topological_sort, topological_levels, Cycle};
pub use version::{compare_versions, Constraint, ConstraintOp, ConstraintSet, Version, VersionError};

// Test module declaration
#[cfg(test)]
mod tests;
