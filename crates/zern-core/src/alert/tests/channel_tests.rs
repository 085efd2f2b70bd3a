#![cfg(test)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::alert::channel::{AlertChannel, WebhookChannel, WebhookTransport};
use crate::alert::error::AlertError;
use crate::alert::Alert;
use crate::utils::timing::RetryOptions;

fn alert() -> Alert {
    Alert {
        namespace: "net".to_string(),
        kind: "down".to_string(),
        payload: Arc::new(json!(null)),
    }
}

fn flaky_transport(succeed_on: u32) -> (WebhookTransport, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);
    let transport: WebhookTransport = Arc::new(move |_alert| {
        let count = seen.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            if count >= succeed_on {
                Ok(())
            } else {
                Err("connection refused".into())
            }
        })
    });
    (transport, calls)
}

#[tokio::test(start_paused = true)]
async fn webhook_retries_with_backoff_until_success() {
    let (transport, calls) = flaky_transport(3);
    let channel = WebhookChannel::new("ops", transport).with_retry(RetryOptions {
        retries: 3,
        delay: Duration::from_millis(10),
        exponential: true,
        max_delay: Duration::from_secs(1),
    });

    channel.dispatch(&alert()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn webhook_gives_up_after_the_retry_budget() {
    let (transport, calls) = flaky_transport(u32::MAX);
    let channel = WebhookChannel::new("ops", transport).with_retry(RetryOptions {
        retries: 2,
        delay: Duration::from_millis(5),
        exponential: false,
        max_delay: Duration::from_secs(1),
    });

    let err = channel.dispatch(&alert()).await.unwrap_err();
    assert!(matches!(err, AlertError::ChannelFailed { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn webhook_times_out_slow_deliveries() {
    let transport: WebhookTransport = Arc::new(|_alert| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
    });
    let channel = WebhookChannel::new("ops", transport).with_timeout(Duration::from_millis(50));

    let err = channel.dispatch(&alert()).await.unwrap_err();
    assert!(matches!(err, AlertError::Timeout { .. }));
    assert_eq!(err.code(), "AlertChannelTimeout");
}
