#![cfg(test)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error_bus::ErrorBus;
use crate::event::bus::{event_handler, EventBus, EventHandler};
use crate::event::{DeliveryMode, EventDefinition, StartupPolicy};

fn bus() -> EventBus {
    EventBus::new(true, ErrorBus::with_pipeline(Vec::new()))
}

fn recording() -> (EventHandler, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = event_handler(move |payload: Arc<Value>| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().push((*payload).clone());
            Ok(())
        }
    });
    (handler, seen)
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn drop_policy_discards_pre_start_emits() {
    let bus = bus();
    bus.define_event(
        "app",
        "ev",
        EventDefinition { delivery: DeliveryMode::Sync, startup: StartupPolicy::Drop },
    );
    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();

    bus.emit("app", "ev", json!("lost")).await.unwrap();
    bus.start().await;
    settle().await;

    assert!(seen.lock().is_empty());
    assert_eq!(bus.stats().dropped, 1);
}

#[tokio::test]
async fn buffered_emits_replay_to_a_post_start_subscriber() {
    // buffer(1): emit(1) then emit(2) pre-start keeps only 2; a handler
    // subscribed after start observes [2, 3].
    let bus = bus();
    bus.define_event(
        "app",
        "ev",
        EventDefinition { delivery: DeliveryMode::Sync, startup: StartupPolicy::Buffer(1) },
    );

    bus.emit("app", "ev", json!(1)).await.unwrap();
    bus.emit("app", "ev", json!(2)).await.unwrap();

    bus.start().await;
    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();
    bus.emit("app", "ev", json!(3)).await.unwrap();

    settle().await;
    assert_eq!(seen.lock().clone(), vec![json!(2), json!(3)]);
}

#[tokio::test]
async fn buffer_replays_in_fifo_order_before_post_start_emits() {
    let bus = bus();
    bus.define_event(
        "app",
        "ev",
        EventDefinition { delivery: DeliveryMode::Sync, startup: StartupPolicy::Buffer(8) },
    );
    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();

    for n in 0..4 {
        bus.emit("app", "ev", json!(n)).await.unwrap();
    }
    bus.start().await;
    bus.emit("app", "ev", json!(99)).await.unwrap();

    settle().await;
    assert_eq!(
        seen.lock().clone(),
        vec![json!(0), json!(1), json!(2), json!(3), json!(99)]
    );
}

#[tokio::test]
async fn full_buffer_drops_the_oldest_entries() {
    let bus = bus();
    bus.define_event(
        "app",
        "ev",
        EventDefinition { delivery: DeliveryMode::Sync, startup: StartupPolicy::Buffer(2) },
    );
    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();

    for n in 0..5 {
        bus.emit("app", "ev", json!(n)).await.unwrap();
    }
    bus.start().await;
    settle().await;

    // Only the last two survive.
    assert_eq!(seen.lock().clone(), vec![json!(3), json!(4)]);
}

#[tokio::test]
async fn sticky_delivers_to_start_time_handlers_and_late_subscribers() {
    // sticky + sync: pre-start emit(5); a handler subscribed after start
    // observes [5]; emit(6) then appends.
    let bus = bus();
    bus.define_event(
        "app",
        "ev",
        EventDefinition { delivery: DeliveryMode::Sync, startup: StartupPolicy::Sticky },
    );

    let (alive_at_start, seen_early) = recording();
    bus.on("app", "ev", alive_at_start).await.unwrap();

    bus.emit("app", "ev", json!(5)).await.unwrap();
    bus.start().await;
    settle().await;
    assert_eq!(seen_early.lock().clone(), vec![json!(5)]);

    let (late, seen_late) = recording();
    bus.on("app", "ev", late).await.unwrap();
    assert_eq!(seen_late.lock().clone(), vec![json!(5)]);

    bus.emit("app", "ev", json!(6)).await.unwrap();
    assert_eq!(seen_late.lock().clone(), vec![json!(5), json!(6)]);
    // The start-time handler saw the sticky value exactly once.
    assert_eq!(seen_early.lock().clone(), vec![json!(5), json!(6)]);
}

#[tokio::test]
async fn sticky_keeps_only_the_latest_pre_start_value() {
    let bus = bus();
    bus.define_event(
        "app",
        "ev",
        EventDefinition { delivery: DeliveryMode::Sync, startup: StartupPolicy::Sticky },
    );

    bus.emit("app", "ev", json!("old")).await.unwrap();
    bus.emit("app", "ev", json!("new")).await.unwrap();
    bus.start().await;

    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();
    assert_eq!(seen.lock().clone(), vec![json!("new")]);
}

#[tokio::test]
async fn sticky_value_is_frozen_at_start() {
    let bus = bus();
    bus.define_event(
        "app",
        "ev",
        EventDefinition { delivery: DeliveryMode::Sync, startup: StartupPolicy::Sticky },
    );

    bus.emit("app", "ev", json!("pre")).await.unwrap();
    bus.start().await;
    settle().await;

    // Post-start emits behave normally and do not update the sticky value.
    bus.emit("app", "ev", json!("post")).await.unwrap();
    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();
    assert_eq!(seen.lock().clone(), vec![json!("pre")]);
}
