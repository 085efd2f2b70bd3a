use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// The mutable context of one emission as it moves down the middleware
/// chain toward handler dispatch.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub namespace: String,
    pub key: String,
    /// The payload; a stage may replace it before propagation.
    pub payload: Arc<Value>,
    /// Free-form metadata stages may read and mutate.
    pub meta: HashMap<String, Value>,
}

impl EventContext {
    pub fn new(namespace: &str, key: &str, payload: Arc<Value>) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            payload,
            meta: HashMap::new(),
        }
    }
}

/// Outcome of one middleware stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewareOutcome {
    /// Propagate to the next stage (ultimately handler dispatch).
    Continue,
    /// Short-circuit: no further stages, adapters, or handlers run.
    Halt,
}

/// One stage of the emission pipeline.
///
/// Bus-wide stages run first, then namespace stages, then per-event
/// stages. A stage may mutate `meta`, replace the payload, or halt.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str {
        "middleware"
    }

    async fn handle(&self, ctx: &mut EventContext) -> MiddlewareOutcome;
}

struct FnMiddleware<F> {
    f: F,
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut EventContext) -> MiddlewareOutcome + Send + Sync,
{
    async fn handle(&self, ctx: &mut EventContext) -> MiddlewareOutcome {
        (self.f)(ctx)
    }
}

/// Wrap a synchronous closure as a middleware stage.
pub fn middleware_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&mut EventContext) -> MiddlewareOutcome + Send + Sync + 'static,
{
    Arc::new(FnMiddleware { f })
}
