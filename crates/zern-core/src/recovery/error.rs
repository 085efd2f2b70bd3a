//! # Zern Recovery Errors

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    /// Every applicable strategy (and fallback) failed; the original
    /// error re-surfaces at the `recover` call site.
    #[error("no strategy recovered [{namespace}/{kind}] after {attempts} attempt(s)")]
    Exhausted {
        namespace: String,
        kind: String,
        attempts: u32,
    },

    /// The strategy's breaker is open; no attempt was made.
    #[error("circuit open for strategy '{strategy}'; retry in {retry_in:?}")]
    CircuitOpen { strategy: String, retry_in: Duration },

    /// A strategy execution exceeded its bound.
    #[error("strategy '{strategy}' timed out after {bound:?}")]
    StrategyTimeout { strategy: String, bound: Duration },

    /// A strategy ran and failed.
    #[error("strategy '{strategy}' failed: {message}")]
    StrategyFailed { strategy: String, message: String },
}

impl RecoveryError {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            RecoveryError::Exhausted { .. } => "RecoveryExhausted",
            RecoveryError::CircuitOpen { .. } => "CircuitOpen",
            RecoveryError::StrategyTimeout { .. } => "StrategyTimeout",
            RecoveryError::StrategyFailed { .. } => "StrategyFailed",
        }
    }
}
