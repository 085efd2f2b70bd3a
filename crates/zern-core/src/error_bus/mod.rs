//! # Zern Error Bus
//!
//! Declarative, typed error distribution. Plugins declare error kinds per
//! namespace via [`ErrorBus::define_errors`], receive [`ErrorFactory`]
//! handles back, and subscribe per `(namespace, kind)`. Every reported
//! error flows through a configurable policy pipeline before reaching
//! subscribers:
//!
//! - **sanitize**: reduces the report to pure data (serde round-trip of
//!   `meta`, drops the opaque attachment).
//! - **log**: pluggable [`ErrorLogger`](policy::ErrorLogger), defaulting
//!   to the `log` facade.
//! - **sentry**: pluggable [`ErrorReporter`](policy::ErrorReporter).
//! - **retry**: [`retrying`](policy::retrying) wraps a recoverable
//!   handler with a retry/backoff envelope.
//!
//! The event and hook buses route their handler failures here under the
//! `events` and `hooks` namespaces with kind `HandlerError`.

pub mod bus;
pub mod policy;
pub mod report;

/// Namespace used for event-bus handler failures.
pub const EVENTS_NAMESPACE: &str = "events";
/// Namespace used for hook-bus handler failures.
pub const HOOKS_NAMESPACE: &str = "hooks";
/// Kind used for bus handler failures.
pub const HANDLER_ERROR_KIND: &str = "HandlerError";

// Re-export important types
pub use bus::{error_handler, ErrorBus, ErrorBusSnapshot, ErrorHandler, ErrorSubscription};
pub use policy::{
    retrying, CollectingReporter, ErrorLogger, ErrorPolicy, ErrorReporter, FacadeLogger,
    LogPolicy, SanitizePolicy, SentryPolicy,
};
pub use report::{ErrorFactory, ErrorReport};

// Test module declaration
#[cfg(test)]
mod tests;
