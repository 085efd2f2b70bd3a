//! # Zern Event Bus Errors

use thiserror::Error;

use crate::plugin_system::error::DynError;

#[derive(Debug, Error)]
pub enum EventError {
    /// Strict mode rejects emits for undeclared `(namespace, key)` pairs.
    #[error("unknown event '{namespace}/{key}'")]
    UnknownEvent { namespace: String, key: String },

    /// The bus has been destroyed; no further emits are accepted.
    #[error("event bus is destroyed")]
    Destroyed,

    /// A handler failed during dispatch. Never surfaces to the emitter;
    /// it is routed to the error bus.
    #[error("handler for '{namespace}/{key}' failed")]
    HandlerError {
        namespace: String,
        key: String,
        #[source]
        cause: DynError,
    },
}

impl EventError {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            EventError::UnknownEvent { .. } => "UnknownEvent",
            EventError::Destroyed => "EventBusDestroyed",
            EventError::HandlerError { .. } => "EventHandlerError",
        }
    }
}
