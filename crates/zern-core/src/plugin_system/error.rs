//! # Zern Plugin System Errors
//!
//! Error types for plugin definition, registration, and API access.
//! Resolution conflicts have their own aggregated report type in
//! [`resolver`](crate::plugin_system::resolver).

use crate::plugin_system::version::VersionError;

/// Boxed error produced by plugin-supplied code (setup, phase functions,
/// API methods).
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    /// The plugin declaration itself is unusable.
    #[error("invalid plugin definition: {message}")]
    InvalidDefinition { message: String },

    /// A plugin with this name is already registered.
    #[error("plugin '{name}' is already registered")]
    DuplicatePlugin { name: String },

    /// The API surface was sealed before this insertion.
    #[error("api of plugin '{plugin}' is sealed; cannot add method '{method}'")]
    SealedApi { plugin: String, method: String },

    /// No such method on the plugin's API surface.
    #[error("unknown api method '{method}' on plugin '{plugin}'")]
    UnknownApiMethod { plugin: String, method: String },

    /// An API method ran and failed.
    #[error("api method '{method}' on plugin '{plugin}' failed")]
    ApiMethodFailed {
        plugin: String,
        method: String,
        #[source]
        source: DynError,
    },

    /// The plugin's `setup` returned an error.
    #[error("setup failed for plugin '{plugin}'")]
    SetupFailed {
        plugin: String,
        #[source]
        source: DynError,
    },

    #[error(transparent)]
    Version(#[from] VersionError),
}

impl PluginSystemError {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            PluginSystemError::InvalidDefinition { .. } => "InvalidPluginDefinition",
            PluginSystemError::DuplicatePlugin { .. } => "DuplicatePlugin",
            PluginSystemError::SealedApi { .. } => "SealedApi",
            PluginSystemError::UnknownApiMethod { .. } => "UnknownApiMethod",
            PluginSystemError::ApiMethodFailed { .. } => "ApiMethodFailed",
            PluginSystemError::SetupFailed { .. } => "SetupFailed",
            PluginSystemError::Version(err) => err.code(),
        }
    }
}
