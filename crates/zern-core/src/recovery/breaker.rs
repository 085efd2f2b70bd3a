use std::time::Duration;

use tokio::time::Instant;

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-strategy circuit breaker.
///
/// Closed admits attempts and counts consecutive failures; at the
/// threshold it opens with a cooldown. Once the cooldown elapses, the
/// next acquisition transitions to half-open and admits exactly one
/// probe: probe success closes the breaker and clears its state, probe
/// failure re-opens it with a fresh cooldown.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            next_attempt: None,
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Ask to run an attempt at `now`. `Err` carries the remaining
    /// cooldown. While a half-open probe is outstanding, further
    /// acquisitions are rejected.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        match self.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => match self.next_attempt {
                Some(at) if now < at => Err(at.duration_since(now)),
                _ => {
                    self.state = BreakerState::HalfOpen;
                    Ok(())
                }
            },
            BreakerState::HalfOpen => Err(Duration::ZERO),
        }
    }

    /// Record a successful attempt: close and clear state.
    pub fn on_success(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.last_failure = None;
        self.next_attempt = None;
    }

    /// Record a failed attempt.
    pub fn on_failure(&mut self, now: Instant) {
        self.last_failure = Some(now);
        self.failure_count = self.failure_count.saturating_add(1);
        match self.state {
            BreakerState::HalfOpen => {
                // Failed probe: fresh cooldown.
                self.state = BreakerState::Open;
                self.next_attempt = Some(now + self.cooldown);
            }
            BreakerState::Closed => {
                if self.failure_count >= self.threshold {
                    self.state = BreakerState::Open;
                    self.next_attempt = Some(now + self.cooldown);
                }
            }
            BreakerState::Open => {}
        }
    }
}
