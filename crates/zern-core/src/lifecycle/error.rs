//! # Zern Lifecycle Errors
//!
//! Errors raised while executing lifecycle phases. A phase failure aborts
//! the boot; teardown errors are reported on the error bus instead.

use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::LifecyclePhase;
use crate::plugin_system::error::DynError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A phase function failed after exhausting its retry budget.
    #[error("lifecycle phase '{phase}' failed for plugin '{plugin}'")]
    PhaseFailed {
        plugin: String,
        phase: LifecyclePhase,
        #[source]
        cause: DynError,
    },

    /// A single phase attempt exceeded its deadline.
    #[error("lifecycle phase '{phase}' timed out after {timeout:?} for plugin '{plugin}'")]
    PhaseTimeout {
        plugin: String,
        phase: LifecyclePhase,
        timeout: Duration,
    },
}

impl LifecycleError {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::PhaseFailed { .. } => "LifecyclePhaseFailed",
            LifecycleError::PhaseTimeout { .. } => "LifecyclePhaseTimeout",
        }
    }

    /// The plugin the failure is attributed to.
    pub fn plugin(&self) -> &str {
        match self {
            LifecycleError::PhaseFailed { plugin, .. } => plugin,
            LifecycleError::PhaseTimeout { plugin, .. } => plugin,
        }
    }

    /// The phase that failed.
    pub fn phase(&self) -> LifecyclePhase {
        match self {
            LifecycleError::PhaseFailed { phase, .. } => *phase,
            LifecycleError::PhaseTimeout { phase, .. } => *phase,
        }
    }
}
