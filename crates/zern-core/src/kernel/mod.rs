//! # Zern Kernel
//!
//! The facade composing the whole runtime: the fluent
//! [`KernelBuilder`](builder::KernelBuilder), the recognized
//! [`KernelOptions`](options::KernelOptions), the shared
//! [`KernelContext`](context::KernelContext) handed to plugin callbacks,
//! and the [`Kernel`](bootstrap::Kernel) itself with `init`/`destroy`,
//! the published plugin APIs, and accessors for the four buses.

pub mod bootstrap;
pub mod builder;
pub mod constants;
pub mod context;
pub mod error;
pub mod options;

// Re-export important types
pub use bootstrap::Kernel;
pub use builder::{create_kernel, KernelBuilder};
pub use constants::{
    KERNEL_EVENT_BUFFER, KERNEL_NAMESPACE, MULTIPLE_AUGMENTS_KIND, PLUGIN_FAILED_EVENT,
    PLUGIN_LOADED_EVENT,
};
pub use context::KernelContext;
pub use error::{KernelError, KernelErrorKind, KernelState};
pub use options::{EventOptions, KernelOptions, LifecycleOptions, ResolverOptions};

// Test module declaration
#[cfg(test)]
mod tests;
