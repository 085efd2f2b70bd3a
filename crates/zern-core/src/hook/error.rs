//! # Zern Hook Bus Errors

use thiserror::Error;

use crate::plugin_system::error::DynError;

#[derive(Debug, Error)]
pub enum HookError {
    /// Hooks are created eagerly; emitting or subscribing to an
    /// undeclared key is an error.
    #[error("unknown hook '{namespace}/{key}'")]
    UnknownHook { namespace: String, key: String },

    /// A handler failed during dispatch. Routed to the error bus, never
    /// back to the emitter.
    #[error("hook handler for '{namespace}/{key}' failed")]
    HandlerError {
        namespace: String,
        key: String,
        #[source]
        cause: DynError,
    },
}

impl HookError {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            HookError::UnknownHook { .. } => "UnknownHook",
            HookError::HandlerError { .. } => "HookHandlerError",
        }
    }
}
