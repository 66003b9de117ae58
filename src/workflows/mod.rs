// Provisioning workflows
//
// Each workflow is an explicit state machine driven by `machine::drive`.
// Sub-workflows hand back a terminal result value; the top-level flows
// sequence them and branch on that value.

pub mod machine;
pub mod progress;
pub mod readiness;
pub mod image_sideload;
pub mod ota_enrollment;
pub mod device_configuration;
pub mod device_completion;

use thiserror::Error;

use crate::device::DeviceCommandError;

pub use device_completion::{complete_device, CompletionOutcome};
pub use device_configuration::{prepare_device, PrepareReport};
pub use machine::{drive, Step, Workflow};
pub use progress::{ConsoleObserver, Progress, ProgressObserver};
#[cfg(any(test, feature = "testing"))]
pub use progress::RecordingObserver;
pub use readiness::{evaluate, ReadinessIssue, Verdict};

/// A workflow that ended in its `Error` state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {source}")]
pub struct WorkflowFailure {
    pub stage: &'static str,
    #[source]
    pub source: DeviceCommandError,
}
