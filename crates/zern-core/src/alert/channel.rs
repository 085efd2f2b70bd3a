use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::alert::error::AlertError;
use crate::alert::Alert;
use crate::plugin_system::error::DynError;
use crate::utils::timing::{retry_with_backoff, with_deadline, RetryOptions};

/// An alert-bus observer that receives every emission after all
/// subscribers have completed, awaited in channel-registration order.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn dispatch(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Channel that writes every alert through the `log` facade.
#[derive(Debug, Default)]
pub struct ConsoleChannel;

#[async_trait]
impl AlertChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn dispatch(&self, alert: &Alert) -> Result<(), AlertError> {
        log::warn!("[{}/{}] {}", alert.namespace, alert.kind, alert.payload);
        Ok(())
    }
}

/// The delivery function backing a webhook channel. Actual transport is
/// supplied by the host; the channel contributes the timeout and
/// retry/backoff envelope.
pub type WebhookTransport = Arc<dyn Fn(Alert) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;

/// Webhook-style channel: each dispatch runs the transport under an
/// optional deadline, retrying with exponential backoff.
pub struct WebhookChannel {
    name: String,
    transport: WebhookTransport,
    timeout: Option<Duration>,
    retry: RetryOptions,
}

impl WebhookChannel {
    pub fn new(name: &str, transport: WebhookTransport) -> Self {
        Self {
            name: name.to_string(),
            transport,
            timeout: None,
            retry: RetryOptions { retries: 0, ..RetryOptions::default() },
        }
    }

    /// Bound each delivery attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry failed deliveries with the given shape.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dispatch(&self, alert: &Alert) -> Result<(), AlertError> {
        let transport = Arc::clone(&self.transport);
        let channel = self.name.clone();
        let timeout = self.timeout;
        let alert = alert.clone();

        retry_with_backoff(&self.retry, move |_| {
            let transport = Arc::clone(&transport);
            let channel = channel.clone();
            let alert = alert.clone();
            async move {
                let delivery = transport(alert);
                let outcome = match timeout {
                    Some(deadline) => with_deadline(deadline, delivery)
                        .await
                        .map_err(|_| AlertError::Timeout { channel: channel.clone(), timeout: deadline })?,
                    None => delivery.await,
                };
                outcome.map_err(|source| AlertError::ChannelFailed { channel, source })
            }
        })
        .await
    }
}

impl std::fmt::Debug for WebhookChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookChannel")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
