use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error_bus::bus::ErrorHandler;
use crate::error_bus::report::ErrorReport;
use crate::plugin_system::error::DynError;
use crate::utils::timing::{retry_with_backoff, RetryOptions};

/// One stage of the error propagation pipeline. Stages run in pipeline
/// order and may rewrite the report in place.
#[async_trait]
pub trait ErrorPolicy: Send + Sync {
    fn name(&self) -> &str;
    async fn apply(&self, report: &mut ErrorReport);
}

/// Reduces the report to pure data: the opaque attachment is dropped and
/// `meta` is round-tripped through serde so only serializable content
/// survives. Causes are left intact.
#[derive(Debug, Default)]
pub struct SanitizePolicy;

#[async_trait]
impl ErrorPolicy for SanitizePolicy {
    fn name(&self) -> &str {
        "sanitize"
    }

    async fn apply(&self, report: &mut ErrorReport) {
        report.attachment = None;
        if let Ok(raw) = serde_json::to_string(&report.meta) {
            if let Ok(clean) = serde_json::from_str(&raw) {
                report.meta = clean;
            }
        }
    }
}

/// Pluggable logging seam for the log stage.
pub trait ErrorLogger: Send + Sync {
    fn log(&self, report: &ErrorReport);
}

/// Default logger writing through the `log` facade.
#[derive(Debug, Default)]
pub struct FacadeLogger;

impl ErrorLogger for FacadeLogger {
    fn log(&self, report: &ErrorReport) {
        log::error!("[{}/{}] {}", report.namespace, report.kind, report.message);
    }
}

/// Logs every report through the configured [`ErrorLogger`].
pub struct LogPolicy {
    logger: Arc<dyn ErrorLogger>,
}

impl LogPolicy {
    pub fn new(logger: Arc<dyn ErrorLogger>) -> Self {
        Self { logger }
    }
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self::new(Arc::new(FacadeLogger))
    }
}

#[async_trait]
impl ErrorPolicy for LogPolicy {
    fn name(&self) -> &str {
        "log"
    }

    async fn apply(&self, report: &mut ErrorReport) {
        self.logger.log(report);
    }
}

/// Pluggable external reporter seam for the sentry stage.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn capture(&self, report: &ErrorReport);
}

/// Reporter that keeps every captured report in memory. Useful as a
/// default sink and in test harnesses.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    captured: Mutex<Vec<ErrorReport>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<ErrorReport> {
        self.captured.lock().clone()
    }
}

#[async_trait]
impl ErrorReporter for CollectingReporter {
    async fn capture(&self, report: &ErrorReport) {
        self.captured.lock().push(report.clone());
    }
}

/// Forwards every report to the configured [`ErrorReporter`].
pub struct SentryPolicy {
    reporter: Arc<dyn ErrorReporter>,
}

impl SentryPolicy {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }
}

#[async_trait]
impl ErrorPolicy for SentryPolicy {
    fn name(&self) -> &str {
        "sentry"
    }

    async fn apply(&self, report: &mut ErrorReport) {
        self.reporter.capture(report).await;
    }
}

/// A handler that can fail and therefore be retried.
pub type RecoverableHandler =
    Arc<dyn Fn(Arc<ErrorReport>) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;

/// Wrap a recoverable handler with a retry/backoff envelope, yielding an
/// ordinary error-bus handler. Exhausted retries are logged, not
/// re-thrown.
pub fn retrying(handler: RecoverableHandler, options: RetryOptions) -> ErrorHandler {
    Arc::new(move |report: Arc<ErrorReport>| {
        let handler = Arc::clone(&handler);
        let options = options.clone();
        Box::pin(async move {
            let outcome = retry_with_backoff(&options, |_| handler(Arc::clone(&report))).await;
            if let Err(err) = outcome {
                log::warn!(
                    "recoverable handler for [{}/{}] gave up: {}",
                    report.namespace,
                    report.kind,
                    err
                );
            }
        })
    })
}
