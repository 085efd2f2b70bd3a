//! # Zern Lifecycle Engine
//!
//! Runs the six lifecycle phases across the resolved plugin order:
//! `beforeInit → init → afterInit` at boot and, in exact reverse order,
//! `beforeDestroy → destroy → afterDestroy` at shutdown.
//!
//! ## Key Components:
//!
//! - **[`LifecyclePhase`]**: the phase enum indexing each plugin's phase
//!   table; no name-based reflection exists.
//! - **[`PhasePolicy`]**: per-phase deadline and retry budget. Deadlines
//!   abandon (never cancel) the in-flight attempt.
//! - **[`LifecycleEngine`](engine::LifecycleEngine)**: executes a phase
//!   across the ordered plugin list under bounded parallelism, grouping
//!   plugins into topological levels when the concurrency limit exceeds 1.
//! - **[`error`]**: phase failure and timeout errors.

pub mod engine;
pub mod error;

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// The six lifecycle phases, in boot order then teardown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecyclePhase {
    BeforeInit,
    Init,
    AfterInit,
    BeforeDestroy,
    Destroy,
    AfterDestroy,
}

impl LifecyclePhase {
    /// Boot phases in execution order.
    pub const INIT_PHASES: [LifecyclePhase; 3] = [
        LifecyclePhase::BeforeInit,
        LifecyclePhase::Init,
        LifecyclePhase::AfterInit,
    ];

    /// Teardown phases in execution order.
    pub const DESTROY_PHASES: [LifecyclePhase; 3] = [
        LifecyclePhase::BeforeDestroy,
        LifecyclePhase::Destroy,
        LifecyclePhase::AfterDestroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::BeforeInit => "beforeInit",
            LifecyclePhase::Init => "init",
            LifecyclePhase::AfterInit => "afterInit",
            LifecyclePhase::BeforeDestroy => "beforeDestroy",
            LifecyclePhase::Destroy => "destroy",
            LifecyclePhase::AfterDestroy => "afterDestroy",
        }
    }

    pub fn is_destroy_phase(&self) -> bool {
        matches!(
            self,
            LifecyclePhase::BeforeDestroy | LifecyclePhase::Destroy | LifecyclePhase::AfterDestroy
        )
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-phase execution policy.
///
/// `timeout_ms` bounds a single attempt; `retry` grants that many extra
/// attempts, so a phase function runs at most `retry + 1` times per boot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PhasePolicy {
    pub timeout_ms: Option<u64>,
    pub retry: u32,
}

impl PhasePolicy {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Total attempt budget.
    pub fn attempts(&self) -> u32 {
        self.retry.saturating_add(1)
    }
}

// Re-export important types
pub use engine::LifecycleEngine;
pub use error::LifecycleError;

// Test module declaration
#[cfg(test)]
mod tests;
