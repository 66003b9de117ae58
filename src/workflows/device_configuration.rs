// Top-level "prepare" flow: image sideload, then OTA enrollment

use tracing::info;

use crate::device::{DeviceSession, ManufacturingState};
use crate::device_config::DeviceConfig;
use crate::workflows::image_sideload::{sideload_images, SideloadReport};
use crate::workflows::ota_enrollment::enroll_device;
use crate::workflows::progress::ProgressObserver;
use crate::workflows::WorkflowFailure;

/// Outcome of a successful prepare run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    /// State observed while sideloading; for display only
    pub manufacturing_state: Option<ManufacturingState>,
    pub sideload: SideloadReport,
}

impl PrepareReport {
    /// Whether the operator should move on to `complete`
    pub fn ready_to_complete(&self) -> bool {
        !matches!(self.manufacturing_state, Some(ManufacturingState::DeviceComplete))
    }
}

/// Sideload images, then enroll the device for OTA updates.
///
/// Enrollment only starts once sideloading reached `Done`; the first failing
/// sub-workflow ends the run and nothing already done is rolled back.
pub async fn prepare_device(
    config: &DeviceConfig,
    session: &DeviceSession,
    observer: &dyn ProgressObserver,
) -> Result<PrepareReport, WorkflowFailure> {
    let sideload = sideload_images(config, session, observer).await?;
    info!(
        manufacturing_state = ?sideload.manufacturing_state,
        recovered = sideload.recovered,
        images_sideloaded = sideload.images_sideloaded,
        "Image sideload finished"
    );

    enroll_device(&config.device_group, session, observer).await?;

    Ok(PrepareReport {
        manufacturing_state: sideload.manufacturing_state,
        sideload,
    })
}
