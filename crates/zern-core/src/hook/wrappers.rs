use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

use crate::hook::bus::HookHandler;

struct DebounceState {
    generation: AtomicU64,
    latest: Mutex<Option<Arc<Value>>>,
}

/// Debounce a handler: it fires once `window` after the most recent emit,
/// with intervening emits resetting the timer and replacing the pending
/// payload. The deferred firing runs outside dispatch, so a late failure
/// is logged rather than routed.
pub fn debounce(window: Duration, handler: HookHandler) -> HookHandler {
    let state = Arc::new(DebounceState {
        generation: AtomicU64::new(0),
        latest: Mutex::new(None),
    });

    Arc::new(move |payload: Arc<Value>| {
        let state = Arc::clone(&state);
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state.latest.lock() = Some(payload);

            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                // A newer emit restarted the window; let its timer fire.
                if state.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                let payload = state.latest.lock().take();
                if let Some(payload) = payload {
                    if let Err(err) = handler(payload).await {
                        log::warn!("debounced hook handler failed: {err}");
                    }
                }
            });
            Ok(())
        })
    })
}

/// Throttle a handler to the leading edge: it fires immediately, then at
/// most once per `window`; emits inside the window are discarded.
pub fn throttle(window: Duration, handler: HookHandler) -> HookHandler {
    let last_fire: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

    Arc::new(move |payload: Arc<Value>| {
        let allowed = {
            let mut last = last_fire.lock();
            let now = Instant::now();
            match *last {
                Some(previous) if now.duration_since(previous) < window => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };
        if allowed {
            handler(payload)
        } else {
            Box::pin(async { Ok(()) })
        }
    })
}
