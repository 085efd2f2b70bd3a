//! # Zern Kernel Errors
//!
//! The top-level [`KernelError`] wraps subsystem failures behind a cheap
//! clone, so a settled `init` outcome can be handed back verbatim on
//! repeated calls.

use std::fmt;
use std::sync::Arc;

use crate::event::error::EventError;
use crate::lifecycle::error::LifecycleError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::resolver::ConflictReport;

/// The kernel's coarse lifecycle states. `Error` is an absorbing sink
/// reachable from any transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    Uninitialized,
    Building,
    Initializing,
    Initialized,
    Destroying,
    Destroyed,
    Error,
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelState::Uninitialized => "uninitialized",
            KernelState::Building => "building",
            KernelState::Initializing => "initializing",
            KernelState::Initialized => "initialized",
            KernelState::Destroying => "destroying",
            KernelState::Destroyed => "destroyed",
            KernelState::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// The underlying cause of a kernel failure.
#[derive(Debug, thiserror::Error)]
pub enum KernelErrorKind {
    #[error("dependency resolution failed")]
    Resolver(#[source] ConflictReport),

    #[error("plugin system failure")]
    Plugin(#[source] PluginSystemError),

    #[error("lifecycle failure")]
    Lifecycle(#[source] LifecycleError),

    #[error("event bus failure")]
    Events(#[source] EventError),

    #[error("kernel is not initialized")]
    NotInitialized,

    #[error("kernel is already initialized")]
    AlreadyInitialized,

    #[error("invalid kernel state: expected {expected}, found {actual}")]
    InvalidState {
        expected: KernelState,
        actual: KernelState,
    },
}

/// Top-level kernel error.
#[derive(Debug, Clone)]
pub struct KernelError(Arc<KernelErrorKind>);

impl KernelError {
    pub fn kind(&self) -> &KernelErrorKind {
        &self.0
    }

    /// Stable error code of the underlying cause.
    pub fn code(&self) -> &'static str {
        match &*self.0 {
            KernelErrorKind::Resolver(report) => report.primary_code(),
            KernelErrorKind::Plugin(err) => err.code(),
            KernelErrorKind::Lifecycle(err) => err.code(),
            KernelErrorKind::Events(err) => err.code(),
            KernelErrorKind::NotInitialized => "KernelNotInitialized",
            KernelErrorKind::AlreadyInitialized => "KernelAlreadyInitialized",
            KernelErrorKind::InvalidState { .. } => "KernelInvalidState",
        }
    }

    pub(crate) fn invalid_state(expected: KernelState, actual: KernelState) -> Self {
        KernelErrorKind::InvalidState { expected, actual }.into()
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for KernelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&*self.0)
    }
}

impl From<KernelErrorKind> for KernelError {
    fn from(kind: KernelErrorKind) -> Self {
        Self(Arc::new(kind))
    }
}

impl From<ConflictReport> for KernelError {
    fn from(report: ConflictReport) -> Self {
        KernelErrorKind::Resolver(report).into()
    }
}

impl From<PluginSystemError> for KernelError {
    fn from(err: PluginSystemError) -> Self {
        KernelErrorKind::Plugin(err).into()
    }
}

impl From<LifecycleError> for KernelError {
    fn from(err: LifecycleError) -> Self {
        KernelErrorKind::Lifecycle(err).into()
    }
}

impl From<EventError> for KernelError {
    fn from(err: EventError) -> Self {
        KernelErrorKind::Events(err).into()
    }
}

/// Shorthand for Result with the kernel error type.
pub type Result<T> = std::result::Result<T, KernelError>;
