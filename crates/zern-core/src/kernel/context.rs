use std::sync::Arc;

use crate::alert::AlertBus;
use crate::error_bus::ErrorBus;
use crate::event::EventBus;
use crate::hook::HookBus;
use crate::recovery::RecoveryManager;

/// Shared kernel handles passed explicitly into plugin-facing callbacks
/// (`setup`, lifecycle phases). There is no global kernel binding;
/// everything a plugin touches arrives through this context.
#[derive(Debug, Clone)]
pub struct KernelContext {
    pub events: EventBus,
    pub hooks: HookBus,
    pub alerts: AlertBus,
    pub errors: ErrorBus,
    pub recovery: Arc<RecoveryManager>,
}
