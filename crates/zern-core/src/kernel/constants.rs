//! Reserved kernel bus addresses.

/// Namespace for kernel-emitted events and errors.
pub const KERNEL_NAMESPACE: &str = "kernel";

/// Emitted after a plugin's `afterInit` completes.
pub const PLUGIN_LOADED_EVENT: &str = "pluginLoaded";

/// Emitted when a boot aborts on a plugin failure.
pub const PLUGIN_FAILED_EVENT: &str = "pluginFailed";

/// Error kind for augmentation collisions.
pub const MULTIPLE_AUGMENTS_KIND: &str = "MultipleAugments";

/// How many kernel boot events are buffered until the bus starts.
pub const KERNEL_EVENT_BUFFER: usize = 32;
