use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// A structured error report traveling on the error bus.
///
/// `kind` doubles as the stable error code; `meta` is pure data; `cause`
/// preserves the underlying error chain. `attachment` carries an opaque
/// non-data payload that only the sanitize policy stage removes.
#[derive(Clone)]
pub struct ErrorReport {
    pub namespace: String,
    pub kind: String,
    pub message: String,
    pub meta: Value,
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    pub attachment: Option<Arc<dyn Any + Send + Sync>>,
}

impl ErrorReport {
    pub fn new(namespace: &str, kind: &str, message: impl Into<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            message: message.into(),
            meta: Value::Null,
            cause: None,
            attachment: None,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_shared_cause(mut self, cause: Arc<dyn std::error::Error + Send + Sync>) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_attachment(mut self, attachment: Arc<dyn Any + Send + Sync>) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Stable error code.
    pub fn code(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.namespace, self.kind, self.message)
    }
}

impl fmt::Debug for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReport")
            .field("namespace", &self.namespace)
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("meta", &self.meta)
            .field("has_cause", &self.cause.is_some())
            .field("has_attachment", &self.attachment.is_some())
            .finish()
    }
}

impl std::error::Error for ErrorReport {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

/// A typed factory for a declared `(namespace, kind)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFactory {
    namespace: String,
    kind: String,
}

impl ErrorFactory {
    pub(crate) fn new(namespace: &str, kind: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Build a report of this kind.
    pub fn build(&self, message: impl Into<String>) -> ErrorReport {
        ErrorReport::new(&self.namespace, &self.kind, message)
    }
}
