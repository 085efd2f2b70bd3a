use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::error_bus::report::ErrorReport;
use crate::recovery::breaker::{BreakerState, CircuitBreaker};
use crate::recovery::error::RecoveryError;
use crate::recovery::strategy::RecoveryStrategy;
use crate::recovery::RecoveryOptions;
use crate::utils::timing::{backoff_delay, with_deadline};

/// Outcome of one strategy attempt, kept for provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed(String),
    TimedOut,
    CircuitOpen,
}

/// One recorded attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub strategy: String,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub duration: Duration,
}

/// Result of a successful recovery.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// The strategy that succeeded.
    pub strategy: String,
    /// Every attempt made along the way, in order.
    pub attempts: Vec<AttemptRecord>,
    /// Whether the winning strategy came from the fallback list.
    pub fallback_used: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct StrategyStats {
    attempts: u64,
    successes: u64,
    total_duration: Duration,
}

/// Aggregate statistics for one strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategySnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub average_duration: Duration,
}

/// Coordinates recovery: priority-ordered strategies gated by per-strategy
/// circuit breakers, bounded executions with retry/backoff, an optional
/// fallback list, and per-attempt provenance.
pub struct RecoveryManager {
    options: RecoveryOptions,
    strategies: RwLock<Vec<Arc<dyn RecoveryStrategy>>>,
    fallbacks: RwLock<Vec<Arc<dyn RecoveryStrategy>>>,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    history: Mutex<Vec<AttemptRecord>>,
    stats: Mutex<HashMap<String, StrategyStats>>,
}

impl RecoveryManager {
    pub fn new(options: RecoveryOptions) -> Self {
        Self {
            options,
            strategies: RwLock::new(Vec::new()),
            fallbacks: RwLock::new(Vec::new()),
            breakers: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &RecoveryOptions {
        &self.options
    }

    pub fn register_strategy(&self, strategy: Arc<dyn RecoveryStrategy>) {
        self.strategies.write().push(strategy);
    }

    pub fn register_fallback(&self, strategy: Arc<dyn RecoveryStrategy>) {
        self.fallbacks.write().push(strategy);
    }

    /// Current breaker position for a strategy; `Closed` when untracked.
    pub fn breaker_state(&self, strategy: &str) -> BreakerState {
        self.breakers
            .lock()
            .get(strategy)
            .map(CircuitBreaker::state)
            .unwrap_or(BreakerState::Closed)
    }

    /// Attempt recording, most recent last.
    pub fn history(&self) -> Vec<AttemptRecord> {
        self.history.lock().clone()
    }

    /// Aggregate statistics for one strategy.
    pub fn strategy_stats(&self, strategy: &str) -> Option<StrategySnapshot> {
        self.stats.lock().get(strategy).map(|s| StrategySnapshot {
            attempts: s.attempts,
            successes: s.successes,
            success_rate: if s.attempts == 0 {
                0.0
            } else {
                s.successes as f64 / s.attempts as f64
            },
            average_duration: if s.attempts == 0 {
                Duration::ZERO
            } else {
                s.total_duration / s.attempts as u32
            },
        })
    }

    /// Attempt to recover from `report`.
    ///
    /// Strategies are sorted by descending priority and filtered to those
    /// claiming the error. If everything fails (including fallbacks, when
    /// enabled), the original error re-surfaces as the `Err` value.
    pub async fn recover(&self, report: ErrorReport) -> Result<RecoveryOutcome, ErrorReport> {
        let started = Instant::now();
        let shared = Arc::new(report.clone());
        let mut attempts = Vec::new();
        let mut total_tries: u32 = 0;

        let primary = self.applicable(&self.strategies.read(), &shared);
        for strategy in primary {
            match self.run_strategy(&strategy, &shared, &mut attempts, &mut total_tries).await {
                Ok(()) => {
                    return Ok(self.finish(strategy.name(), attempts, false, started));
                }
                Err(err) => {
                    log::debug!("strategy '{}' did not recover: {err}", strategy.name());
                }
            }
        }

        if self.options.enable_fallbacks {
            let fallback = self.applicable(&self.fallbacks.read(), &shared);
            for strategy in fallback {
                match self.run_strategy(&strategy, &shared, &mut attempts, &mut total_tries).await {
                    Ok(()) => {
                        return Ok(self.finish(strategy.name(), attempts, true, started));
                    }
                    Err(err) => {
                        log::debug!("fallback '{}' did not recover: {err}", strategy.name());
                    }
                }
            }
        }

        self.history.lock().extend(attempts);
        let exhausted = RecoveryError::Exhausted {
            namespace: report.namespace.clone(),
            kind: report.kind.clone(),
            attempts: total_tries,
        };
        log::error!("{exhausted}");
        Err(report)
    }

    fn finish(
        &self,
        strategy: &str,
        attempts: Vec<AttemptRecord>,
        fallback_used: bool,
        started: Instant,
    ) -> RecoveryOutcome {
        self.history.lock().extend(attempts.iter().cloned());
        RecoveryOutcome {
            strategy: strategy.to_string(),
            attempts,
            fallback_used,
            duration: started.elapsed(),
        }
    }

    /// Strategies claiming the error, highest priority first. The sort is
    /// stable, so equal priorities keep registration order.
    fn applicable(
        &self,
        pool: &[Arc<dyn RecoveryStrategy>],
        report: &ErrorReport,
    ) -> Vec<Arc<dyn RecoveryStrategy>> {
        let mut picked: Vec<Arc<dyn RecoveryStrategy>> = pool
            .iter()
            .filter(|s| s.can_recover(report))
            .cloned()
            .collect();
        picked.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        picked
    }

    /// One full strategy execution: breaker gate, then up to
    /// `max_retries + 1` bounded attempts with backoff between them. The
    /// breaker records the execution's overall outcome.
    async fn run_strategy(
        &self,
        strategy: &Arc<dyn RecoveryStrategy>,
        report: &Arc<ErrorReport>,
        attempts: &mut Vec<AttemptRecord>,
        total_tries: &mut u32,
    ) -> Result<(), RecoveryError> {
        let name = strategy.name().to_string();

        {
            let mut breakers = self.breakers.lock();
            let breaker = breakers.entry(name.clone()).or_insert_with(|| {
                CircuitBreaker::new(
                    self.options.circuit_breaker_threshold,
                    self.options.circuit_breaker_timeout(),
                )
            });
            if let Err(retry_in) = breaker.try_acquire(Instant::now()) {
                attempts.push(AttemptRecord {
                    strategy: name.clone(),
                    attempt: 0,
                    outcome: AttemptOutcome::CircuitOpen,
                    duration: Duration::ZERO,
                });
                return Err(RecoveryError::CircuitOpen { strategy: name, retry_in });
            }
        }

        let bound = strategy.estimated_time() * 2;
        let mut attempt: u32 = 0;
        loop {
            *total_tries += 1;
            let attempt_started = Instant::now();
            let run = {
                let strategy = Arc::clone(strategy);
                let report = Arc::clone(report);
                async move { strategy.recover(&report).await }
            };
            let (outcome, error) = match with_deadline(bound, run).await {
                Ok(Ok(())) => (AttemptOutcome::Success, None),
                Ok(Err(err)) => (
                    AttemptOutcome::Failed(err.to_string()),
                    Some(RecoveryError::StrategyFailed {
                        strategy: name.clone(),
                        message: err.to_string(),
                    }),
                ),
                Err(_) => (
                    AttemptOutcome::TimedOut,
                    Some(RecoveryError::StrategyTimeout { strategy: name.clone(), bound }),
                ),
            };

            let duration = attempt_started.elapsed();
            attempts.push(AttemptRecord {
                strategy: name.clone(),
                attempt,
                outcome: outcome.clone(),
                duration,
            });
            {
                let mut stats = self.stats.lock();
                let entry = stats.entry(name.clone()).or_default();
                entry.attempts += 1;
                entry.total_duration += duration;
                if outcome == AttemptOutcome::Success {
                    entry.successes += 1;
                }
            }

            match error {
                None => {
                    self.breakers.lock().entry(name).or_insert_with(|| {
                        CircuitBreaker::new(
                            self.options.circuit_breaker_threshold,
                            self.options.circuit_breaker_timeout(),
                        )
                    }).on_success();
                    return Ok(());
                }
                Some(err) if attempt < self.options.max_retries => {
                    let delay = backoff_delay(
                        self.options.retry_delay(),
                        attempt,
                        self.options.exponential_backoff,
                        self.options.max_backoff_delay(),
                    );
                    log::debug!("strategy '{}' attempt {} failed ({err}); retrying in {delay:?}", name, attempt);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Some(err) => {
                    let now = Instant::now();
                    if let Some(breaker) = self.breakers.lock().get_mut(&name) {
                        breaker.on_failure(now);
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl std::fmt::Debug for RecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryManager")
            .field("strategies", &self.strategies.read().len())
            .field("fallbacks", &self.fallbacks.read().len())
            .finish_non_exhaustive()
    }
}
