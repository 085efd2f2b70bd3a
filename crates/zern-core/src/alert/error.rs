//! # Zern Alert Bus Errors

use std::time::Duration;

use thiserror::Error;

use crate::plugin_system::error::DynError;

#[derive(Debug, Error)]
pub enum AlertError {
    /// A channel failed to deliver. Isolated by the bus: logged, never
    /// re-thrown to the emitter.
    #[error("alert channel '{channel}' failed")]
    ChannelFailed {
        channel: String,
        #[source]
        source: DynError,
    },

    /// A channel delivery exceeded its deadline.
    #[error("alert channel '{channel}' timed out after {timeout:?}")]
    Timeout { channel: String, timeout: Duration },
}

impl AlertError {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            AlertError::ChannelFailed { .. } => "AlertChannelFailed",
            AlertError::Timeout { .. } => "AlertChannelTimeout",
        }
    }
}
