pub mod manager;

pub use manager::ActivityManager;

use crate::models::{ActivityResultBundle, CoreError, ScheduledActivity};

pub type OrchestrationResult<T> = Result<T, CoreError>;

/// Upload transport seam. Implementations own retry/backoff; the manager
/// only hands bundles over and logs failures.
pub trait ResultUploader: Send + Sync {
    fn upload(&self, bundle: &ActivityResultBundle) -> OrchestrationResult<()>;
}

/// Remote schedule-update seam. Receives exactly the one schedule that
/// changed, never the full activity list.
pub trait ScheduleSink: Send + Sync {
    fn schedule_updated(&self, schedule: &ScheduledActivity) -> OrchestrationResult<()>;
}
