//! # Zern Recovery & Circuit Breaking
//!
//! Cross-cutting error recovery used by the error layer. Strategies are
//! named recipes ([`RecoveryStrategy`](strategy::RecoveryStrategy)) tried
//! in descending priority order; each strategy sits behind its own
//! [`CircuitBreaker`](breaker::CircuitBreaker) with the classic
//! closed/open/half-open shape. Executions are bounded at twice the
//! strategy's estimated time and retried with exponential backoff; an
//! optional fallback list runs when every primary strategy fails. The
//! [`RecoveryManager`](manager::RecoveryManager) records per-attempt
//! provenance and aggregate statistics.

pub mod breaker;
pub mod error;
pub mod manager;
pub mod strategy;

use std::time::Duration;

use serde::Deserialize;

/// Tuning knobs for the recovery layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecoveryOptions {
    /// Extra attempts per strategy execution.
    pub max_retries: u32,
    /// Base delay before the first retry, in milliseconds.
    pub retry_delay_ms: u64,
    /// Double the delay on every retry.
    pub exponential_backoff: bool,
    /// Cap on any single backoff delay, in milliseconds.
    pub max_backoff_delay_ms: u64,
    /// Consecutive failures before a strategy's breaker opens.
    pub circuit_breaker_threshold: u32,
    /// Breaker cooldown before the half-open probe, in milliseconds.
    pub circuit_breaker_timeout_ms: u64,
    /// Try the fallback list when primaries are exhausted.
    pub enable_fallbacks: bool,
    /// Keep degraded results instead of failing outright where a
    /// strategy supports it.
    pub enable_graceful_degradation: bool,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
            exponential_backoff: true,
            max_backoff_delay_ms: 30_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 60_000,
            enable_fallbacks: true,
            enable_graceful_degradation: true,
        }
    }
}

impl RecoveryOptions {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_backoff_delay(&self) -> Duration {
        Duration::from_millis(self.max_backoff_delay_ms)
    }

    pub fn circuit_breaker_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_timeout_ms)
    }
}

// Re-export important types
pub use breaker::{BreakerState, CircuitBreaker};
pub use error::RecoveryError;
pub use manager::{
    AttemptOutcome, AttemptRecord, RecoveryManager, RecoveryOutcome, StrategySnapshot,
};
pub use strategy::RecoveryStrategy;

// Test module declaration
#[cfg(test)]
mod tests;
