#![cfg(test)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error_bus::report::ErrorReport;
use crate::plugin_system::error::DynError;
use crate::recovery::breaker::BreakerState;
use crate::recovery::manager::{AttemptOutcome, RecoveryManager};
use crate::recovery::strategy::RecoveryStrategy;
use crate::recovery::RecoveryOptions;

struct TestStrategy {
    name: String,
    priority: u32,
    succeed_on_attempt: u32,
    estimated: Duration,
    delay: Option<Duration>,
    calls: Arc<AtomicU32>,
    trace: Arc<Mutex<Vec<String>>>,
}

impl TestStrategy {
    fn new(name: &str, priority: u32, succeed_on_attempt: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            succeed_on_attempt,
            estimated: Duration::from_millis(500),
            delay: None,
            calls: Arc::new(AtomicU32::new(0)),
            trace: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RecoveryStrategy for TestStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn estimated_time(&self) -> Duration {
        self.estimated
    }

    fn can_recover(&self, _report: &ErrorReport) -> bool {
        true
    }

    async fn recover(&self, _report: &ErrorReport) -> Result<(), DynError> {
        self.trace.lock().push(self.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.succeed_on_attempt > 0 && attempt >= self.succeed_on_attempt {
            Ok(())
        } else {
            Err("not recovered".into())
        }
    }
}

fn fast_options() -> RecoveryOptions {
    RecoveryOptions {
        max_retries: 0,
        retry_delay_ms: 1,
        exponential_backoff: true,
        max_backoff_delay_ms: 10,
        circuit_breaker_threshold: 2,
        circuit_breaker_timeout_ms: 1_000,
        enable_fallbacks: true,
        enable_graceful_degradation: true,
    }
}

fn report() -> ErrorReport {
    ErrorReport::new("db", "ConnectionLost", "lost the database")
}

#[tokio::test(start_paused = true)]
async fn strategies_run_in_descending_priority_order() {
    let manager = RecoveryManager::new(fast_options());
    let low = TestStrategy::new("low", 1, 0);
    let high = TestStrategy::new("high", 10, 0);
    let winner = TestStrategy::new("winner", 5, 1);
    let trace = Arc::clone(&low.trace);
    let shared = Arc::clone(&trace);
    // All strategies share one trace.
    let high = TestStrategy { trace: Arc::clone(&shared), ..high };
    let winner = TestStrategy { trace: Arc::clone(&shared), ..winner };

    manager.register_strategy(Arc::new(low));
    manager.register_strategy(Arc::new(high));
    manager.register_strategy(Arc::new(winner));

    let outcome = manager.recover(report()).await.unwrap();
    assert_eq!(outcome.strategy, "winner");
    // "high" was tried first and failed; "winner" recovered; "low" never ran.
    assert_eq!(shared.lock().clone(), vec!["high", "winner"]);
}

#[tokio::test(start_paused = true)]
async fn retries_within_a_strategy_use_the_retry_budget() {
    let options = RecoveryOptions { max_retries: 2, ..fast_options() };
    let manager = RecoveryManager::new(options);
    let strategy = TestStrategy::new("restart", 1, 3);
    let calls = Arc::clone(&strategy.calls);
    manager.register_strategy(Arc::new(strategy));

    let outcome = manager.recover(report()).await.unwrap();
    assert_eq!(outcome.strategy, "restart");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.attempts.len(), 3);
    assert_eq!(outcome.attempts[2].outcome, AttemptOutcome::Success);
}

#[tokio::test(start_paused = true)]
async fn slow_strategies_are_timed_out_and_abandoned() {
    let manager = RecoveryManager::new(fast_options());
    let mut strategy = TestStrategy::new("slow", 1, 1);
    strategy.estimated = Duration::from_millis(20);
    strategy.delay = Some(Duration::from_secs(10));
    manager.register_strategy(Arc::new(strategy));

    let err = manager.recover(report()).await.unwrap_err();
    assert_eq!(err.kind, "ConnectionLost");
    let history = manager.history();
    assert!(history.iter().any(|a| a.outcome == AttemptOutcome::TimedOut));
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_after_repeated_strategy_failures() {
    let manager = RecoveryManager::new(fast_options());
    let strategy = TestStrategy::new("flaky", 1, 0);
    manager.register_strategy(Arc::new(strategy));

    // Threshold 2: two failed executions open the breaker.
    assert!(manager.recover(report()).await.is_err());
    assert!(manager.recover(report()).await.is_err());
    assert_eq!(manager.breaker_state("flaky"), BreakerState::Open);

    // The next recovery is rejected at the gate, not executed.
    assert!(manager.recover(report()).await.is_err());
    let history = manager.history();
    assert!(history.iter().any(|a| a.outcome == AttemptOutcome::CircuitOpen));
}

#[tokio::test(start_paused = true)]
async fn fallbacks_run_when_primaries_are_exhausted() {
    let manager = RecoveryManager::new(fast_options());
    manager.register_strategy(Arc::new(TestStrategy::new("primary", 10, 0)));
    manager.register_fallback(Arc::new(TestStrategy::new("fallback", 1, 1)));

    let outcome = manager.recover(report()).await.unwrap();
    assert_eq!(outcome.strategy, "fallback");
    assert!(outcome.fallback_used);
}

#[tokio::test(start_paused = true)]
async fn disabled_fallbacks_resurface_the_original_error() {
    let options = RecoveryOptions { enable_fallbacks: false, ..fast_options() };
    let manager = RecoveryManager::new(options);
    manager.register_strategy(Arc::new(TestStrategy::new("primary", 10, 0)));
    manager.register_fallback(Arc::new(TestStrategy::new("fallback", 1, 1)));

    let original = manager.recover(report()).await.unwrap_err();
    assert_eq!(original.namespace, "db");
    assert_eq!(original.kind, "ConnectionLost");
}

#[tokio::test(start_paused = true)]
async fn statistics_track_success_rate_and_duration() {
    let options = RecoveryOptions { max_retries: 1, ..fast_options() };
    let manager = RecoveryManager::new(options);
    let strategy = TestStrategy::new("restart", 1, 2);
    manager.register_strategy(Arc::new(strategy));

    manager.recover(report()).await.unwrap();

    let stats = manager.strategy_stats("restart").unwrap();
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.successes, 1);
    assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
}
