//! # Zern Event Bus
//!
//! Namespaced event infrastructure with per-event delivery modes, startup
//! policies, a three-tier middleware chain, and observer adapters.
//!
//! ## Key Components:
//!
//! - **[`EventBus`](bus::EventBus)**: the bus itself. Addresses are
//!   `(namespace, key)` pairs; payloads are shared [`serde_json::Value`]s.
//! - **[`DeliveryMode`]**: when handlers run relative to `emit`:
//!   inline (`Sync`), on the bus's FIFO dispatcher (`Microtask`), or on a
//!   later scheduler turn (`Async`).
//! - **[`StartupPolicy`]**: what happens to emits issued before the bus
//!   starts: dropped, FIFO-buffered up to a bound, or latest-value sticky.
//! - **[`middleware`]**: bus-wide, namespace, and per-event middleware
//!   over an [`EventContext`](middleware::EventContext).
//! - **[`adapter`]**: trusted observers (broadcast emitter, stream) that
//!   see each emission exactly once but never participate in delivery.
//! - **[`error`]**: event-system error types.
//!
//! Handler errors never propagate to the emitter; they are routed to the
//! error bus under the `events` namespace.

pub mod adapter;
pub mod bus;
pub mod error;
pub mod middleware;

use serde::Deserialize;

/// When an event's handlers execute relative to `emit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Handlers run on the emitting call stack, awaited in subscription
    /// order; `emit` resolves only after all handlers complete.
    #[default]
    Sync,
    /// `emit` returns immediately; handlers run on the bus dispatcher in
    /// FIFO emit order.
    Microtask,
    /// `emit` returns immediately; handlers run on a later scheduler turn,
    /// interleaving with other async work while preserving emit order.
    Async,
}

/// The rule governing emits issued before the bus starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupPolicy {
    /// Pre-start emits are discarded.
    #[default]
    Drop,
    /// Pre-start emits queue FIFO up to the bound; when full, the oldest
    /// entries are dropped to accept new ones. Replayed at start.
    Buffer(usize),
    /// Only the latest pre-start value is retained; it is delivered to
    /// start-time handlers and to each future subscriber once.
    Sticky,
}

/// An event's declared behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDefinition {
    pub delivery: DeliveryMode,
    pub startup: StartupPolicy,
}

// Re-export important types
pub use adapter::{BroadcastAdapter, EmittedEvent, EventAdapter, StreamAdapter};
pub use bus::{event_handler, EventBus, EventBusSnapshot, EventHandler, OnceValue, Subscription};
pub use error::EventError;
pub use middleware::{middleware_fn, EventContext, Middleware, MiddlewareOutcome};

// Test module declaration
#[cfg(test)]
mod tests;
