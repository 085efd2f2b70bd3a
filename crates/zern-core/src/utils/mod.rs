//! # Zern Core Utilities
//!
//! Shared concurrency and timing primitives used across the kernel:
//! bounded [`parallel_map`](concurrency::parallel_map) execution, deadline
//! racing with best-effort abandonment, and exponential backoff shaping.

pub mod concurrency;
pub mod timing;

pub use concurrency::{parallel_map, Semaphore};
pub use timing::{backoff_delay, retry_with_backoff, with_deadline, DeadlineElapsed, RetryOptions};
