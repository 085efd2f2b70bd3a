pub mod alert;
pub mod error_bus;
pub mod event;
pub mod hook;
pub mod kernel;
pub mod lifecycle;
pub mod plugin_system;
pub mod recovery;
pub mod utils;

// Re-export key public types for easier use by hosts and plugins.
pub use kernel::{create_kernel, Kernel, KernelBuilder, KernelContext, KernelOptions, KernelState};
pub use kernel::error::KernelError;
pub use lifecycle::{LifecycleEngine, LifecyclePhase, PhasePolicy};
pub use plugin_system::{
    Api, ApiHandle, Plugin, PluginBuilder, PluginDependency, PluginOrder, ResolveStrategy,
};
pub use event::{DeliveryMode, EventBus, StartupPolicy};
pub use hook::HookBus;
pub use alert::AlertBus;
pub use error_bus::{ErrorBus, ErrorReport};
pub use recovery::{RecoveryManager, RecoveryStrategy};
