//! # Zern Hook Bus
//!
//! Per-key typed hooks created eagerly by plugins, with `on`/`off`/
//! `emit`/`once`, the same shared-payload rule as the event bus, and two
//! first-class timing wrappers:
//!
//! - [`debounce`](wrappers::debounce): the handler fires once the window
//!   elapses after the last emit; intervening emits reset the timer.
//! - [`throttle`](wrappers::throttle): leading edge, at most one firing
//!   per window.
//!
//! Handler failures are routed to the error bus under the `hooks`
//! namespace with kind `HandlerError`.

pub mod bus;
pub mod error;
pub mod wrappers;

// Re-export important types
pub use bus::{hook_handler, HookBus, HookHandler, HookSubscription, OnceHook};
pub use error::HookError;
pub use wrappers::{debounce, throttle};
