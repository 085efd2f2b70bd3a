use std::time::Duration;

use async_trait::async_trait;

use crate::error_bus::report::ErrorReport;
use crate::plugin_system::error::DynError;

/// A named recipe that decides whether it can recover a given error and
/// executes that recovery.
///
/// The manager tries strategies in descending [`priority`](Self::priority)
/// order and bounds each execution at twice
/// [`estimated_time`](Self::estimated_time).
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Higher priority strategies run first.
    fn priority(&self) -> u32 {
        0
    }

    /// Expected duration of one execution. The default yields the 60s
    /// execution bound.
    fn estimated_time(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Whether this strategy applies to `report`.
    fn can_recover(&self, report: &ErrorReport) -> bool;

    /// Attempt the recovery.
    async fn recover(&self, report: &ErrorReport) -> Result<(), DynError>;
}
