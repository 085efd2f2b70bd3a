use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

/// Error returned when a deadline elapses before the operation settles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation exceeded its {0:?} deadline")]
pub struct DeadlineElapsed(pub Duration);

/// Race `fut` against a deadline.
///
/// The future is spawned onto the runtime so a timeout *abandons* it
/// rather than cancelling it: the in-flight work keeps running in the
/// background while the caller observes [`DeadlineElapsed`]. Panics inside
/// the operation are resumed on the caller.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, DeadlineElapsed>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let mut handle = tokio::spawn(fut);
    tokio::select! {
        joined = &mut handle => match joined {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_panic() {
                    std::panic::resume_unwind(err.into_panic());
                }
                // Aborted from outside; report it as a missed deadline.
                Err(DeadlineElapsed(deadline))
            }
        },
        _ = sleep(deadline) => Err(DeadlineElapsed(deadline)),
    }
}

/// Shape of a retry schedule: how many extra attempts, the base delay, and
/// whether the delay doubles per attempt (capped at `max_delay`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Double the delay on every subsequent retry.
    pub exponential: bool,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(100),
            exponential: true,
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Compute the backoff delay for a zero-based `attempt`.
pub fn backoff_delay(base: Duration, attempt: u32, exponential: bool, cap: Duration) -> Duration {
    if !exponential {
        return base.min(cap);
    }
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(cap, |delay| delay.min(cap))
}

/// Invoke `op` until it succeeds or the retry budget is exhausted.
///
/// `op` receives the zero-based attempt number. The final error is
/// returned unchanged once `options.retries` extra attempts have failed.
pub async fn retry_with_backoff<T, E, F, Fut>(options: &RetryOptions, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(_) if attempt < options.retries => {
                let delay = backoff_delay(options.delay, attempt, options.exponential, options.max_delay);
                log::debug!("attempt {} failed; retrying in {:?}", attempt + 1, delay);
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
