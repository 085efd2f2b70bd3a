#![cfg(test)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error_bus::ErrorBus;
use crate::event::bus::{event_handler, EventBus, EventHandler};
use crate::event::middleware::{middleware_fn, MiddlewareOutcome};
use crate::event::{DeliveryMode, EventDefinition, StartupPolicy};

fn bus() -> EventBus {
    EventBus::new(true, ErrorBus::with_pipeline(Vec::new()))
}

fn sync_event() -> EventDefinition {
    EventDefinition {
        delivery: DeliveryMode::Sync,
        startup: StartupPolicy::Drop,
    }
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

#[tokio::test]
async fn chain_runs_bus_then_namespace_then_event() {
    let bus = bus();
    bus.define_event("app", "ev", sync_event());
    bus.start().await;

    let trace = Arc::new(Mutex::new(Vec::new()));
    for (tier, install) in [
        ("bus", None),
        ("namespace", Some("app")),
        ("event", Some("ev")),
    ] {
        let trace = Arc::clone(&trace);
        let stage = middleware_fn(move |_ctx| {
            trace.lock().push(tier);
            MiddlewareOutcome::Continue
        });
        match (tier, install) {
            ("bus", _) => bus.add_middleware(stage),
            ("namespace", _) => bus.add_namespace_middleware("app", stage),
            _ => bus.add_event_middleware("app", "ev", stage),
        }
    }

    let (handler, _seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();
    bus.emit("app", "ev", json!(null)).await.unwrap();

    assert_eq!(trace.lock().clone(), vec!["bus", "namespace", "event"]);
}

#[tokio::test]
async fn middleware_can_replace_the_payload() {
    let bus = bus();
    bus.define_event("app", "ev", sync_event());
    bus.start().await;

    bus.add_event_middleware(
        "app",
        "ev",
        middleware_fn(|ctx| {
            let doubled = ctx.payload.as_i64().unwrap_or(0) * 2;
            ctx.payload = Arc::new(json!(doubled));
            MiddlewareOutcome::Continue
        }),
    );

    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();
    bus.emit("app", "ev", json!(21)).await.unwrap();
    assert_eq!(seen.lock().clone(), vec![json!(42)]);
}

#[tokio::test]
async fn middleware_meta_flows_down_the_chain() {
    let bus = bus();
    bus.define_event("app", "ev", sync_event());
    bus.start().await;

    bus.add_middleware(middleware_fn(|ctx| {
        ctx.meta.insert("trace_id".to_string(), json!("abc-123"));
        MiddlewareOutcome::Continue
    }));

    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    bus.add_event_middleware(
        "app",
        "ev",
        middleware_fn(move |ctx| {
            *sink.lock() = ctx.meta.get("trace_id").cloned();
            MiddlewareOutcome::Continue
        }),
    );

    let (handler, _seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();
    bus.emit("app", "ev", json!(null)).await.unwrap();
    assert_eq!(observed.lock().clone(), Some(json!("abc-123")));
}

#[tokio::test]
async fn halting_short_circuits_delivery() {
    let bus = bus();
    bus.define_event("app", "ev", sync_event());
    bus.start().await;

    bus.add_namespace_middleware(
        "app",
        middleware_fn(|ctx| {
            if *ctx.payload == json!("blocked") {
                MiddlewareOutcome::Halt
            } else {
                MiddlewareOutcome::Continue
            }
        }),
    );

    let (handler, seen) = recording();
    bus.on("app", "ev", handler).await.unwrap();

    bus.emit("app", "ev", json!("blocked")).await.unwrap();
    bus.emit("app", "ev", json!("allowed")).await.unwrap();

    assert_eq!(seen.lock().clone(), vec![json!("allowed")]);
    assert_eq!(bus.stats().halted, 1);
}
