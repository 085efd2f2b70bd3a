//! # Zern Alert Bus
//!
//! Pure fan-out of `(namespace, kind, payload)` notifications. Every
//! subscriber receives each emission first; registered
//! [`AlertChannel`](channel::AlertChannel)s (console, webhook, custom)
//! receive it afterwards, awaited in registration order. Failures on
//! either side are isolated: logged, never re-thrown to the emitter.
//!
//! The webhook channel wraps a host-supplied transport function with an
//! optional per-attempt deadline and a retry/backoff envelope from the
//! shared timing utilities.

pub mod bus;
pub mod channel;
pub mod error;

use std::sync::Arc;

use serde_json::Value;

/// One alert emission.
#[derive(Debug, Clone)]
pub struct Alert {
    pub namespace: String,
    pub kind: String,
    pub payload: Arc<Value>,
}

// Re-export important types
pub use bus::{alert_handler, AlertBus, AlertHandler, AlertSubscription};
pub use channel::{AlertChannel, ConsoleChannel, WebhookChannel, WebhookTransport};
pub use error::AlertError;

// Test module declaration
#[cfg(test)]
mod tests;
