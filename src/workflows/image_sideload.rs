//! Image sideload workflow
//!
//! Brings the installed image set to the expected one:
//!
//! ```text
//! CheckingManufacturingState -> CheckingIfShouldRecover | Done
//! CheckingIfShouldRecover    -> Recovering | CheckingIfAlreadyInstalled
//! Recovering                 -> CheckingIfAlreadyInstalled | Error
//! CheckingIfAlreadyInstalled -> Done | SideloadingImages
//! SideloadingImages          -> Done | Error
//! ```
//!
//! Recovery and sideloading are attempted at most once per run.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::device::{
    images_equal, DeviceCommandError, DeviceSession, ExpectedImage, Image, ManufacturingState,
};
use crate::device_config::DeviceConfig;
use crate::workflows::machine::{drive, Step, Workflow};
use crate::workflows::progress::{Progress, ProgressObserver};
use crate::workflows::readiness::{
    gather_recovery_facts, recovery_reason, ReadinessIssue, RecoveryFacts,
};
use crate::workflows::WorkflowFailure;

const STAGE: &str = "image sideload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideloadState {
    CheckingManufacturingState,
    CheckingIfShouldRecover,
    Recovering,
    CheckingIfAlreadyInstalled,
    SideloadingImages,
    Done,
    Error(DeviceCommandError),
}

/// Facts accumulated during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideloadContext {
    pub manufacturing_state: Option<ManufacturingState>,
    pub recovery_reason: Option<ReadinessIssue>,
    pub recovered: bool,
    /// Packages still to install, decided by the installed-image check
    pub pending: Vec<PathBuf>,
    pub images_sideloaded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideloadEvent {
    ManufacturingStateRead(ManufacturingState),
    RecoveryFactsGathered(RecoveryFacts),
    Recovered,
    InstalledImagesListed(Vec<Image>),
    ImagesSideloaded { count: usize },
    Failed(DeviceCommandError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideloadEffect {
    ReadManufacturingState,
    GatherRecoveryFacts,
    Recover,
    ListInstalledImages,
    SideloadImages(Vec<PathBuf>),
}

pub struct ImageSideloadWorkflow {
    expected_os_version: String,
    images: Vec<ExpectedImage>,
    pub context: SideloadContext,
}

impl ImageSideloadWorkflow {
    pub fn new(expected_os_version: impl Into<String>, images: Vec<ExpectedImage>) -> Self {
        Self {
            expected_os_version: expected_os_version.into(),
            images,
            context: SideloadContext::default(),
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.expected_os_version.clone(), config.images.clone())
    }

    fn expected_images(&self) -> Vec<Image> {
        self.images.iter().map(ExpectedImage::image).collect()
    }

    /// Packages for expected images the device does not report. When every
    /// expected image is present but the sets still differ, the whole set is
    /// reinstalled.
    fn packages_to_install(&self, installed: &[Image]) -> Vec<PathBuf> {
        let missing: Vec<PathBuf> = self
            .images
            .iter()
            .filter(|expected| {
                !installed
                    .iter()
                    .any(|image| image.image_id == expected.image_id)
            })
            .map(|expected| expected.path.clone())
            .collect();
        if missing.is_empty() {
            self.images.iter().map(|image| image.path.clone()).collect()
        } else {
            missing
        }
    }
}

#[async_trait]
impl Workflow for ImageSideloadWorkflow {
    type State = SideloadState;
    type Event = SideloadEvent;
    type Effect = SideloadEffect;

    fn name(&self) -> &'static str {
        STAGE
    }

    fn initial(&self) -> SideloadState {
        SideloadState::CheckingManufacturingState
    }

    fn effect(&self, state: &SideloadState) -> Option<SideloadEffect> {
        match state {
            SideloadState::CheckingManufacturingState => {
                Some(SideloadEffect::ReadManufacturingState)
            }
            SideloadState::CheckingIfShouldRecover => Some(SideloadEffect::GatherRecoveryFacts),
            SideloadState::Recovering => Some(SideloadEffect::Recover),
            SideloadState::CheckingIfAlreadyInstalled => Some(SideloadEffect::ListInstalledImages),
            SideloadState::SideloadingImages => {
                Some(SideloadEffect::SideloadImages(self.context.pending.clone()))
            }
            SideloadState::Done | SideloadState::Error(_) => None,
        }
    }

    fn on_entry(&self, state: &SideloadState) -> Option<Progress> {
        let message = match state {
            SideloadState::CheckingManufacturingState => "Checking manufacturing state...",
            SideloadState::CheckingIfShouldRecover => {
                "Checking if the device should be recovered..."
            }
            SideloadState::Recovering => {
                "Recovering device... Please note that this may take up to 10 minutes."
            }
            SideloadState::CheckingIfAlreadyInstalled => {
                "Checking if the images are already installed..."
            }
            SideloadState::SideloadingImages => "Sideloading images...",
            SideloadState::Done | SideloadState::Error(_) => return None,
        };
        Some(Progress::Step(message.to_string()))
    }

    fn transition(&mut self, state: SideloadState, event: SideloadEvent) -> Step<SideloadState> {
        use SideloadEvent as E;
        use SideloadState as S;

        match (state, event) {
            (S::CheckingManufacturingState, E::ManufacturingStateRead(observed)) => {
                self.context.manufacturing_state = Some(observed);
                if observed.is_complete() {
                    Step::to(S::Done).with(Progress::Notice(
                        "The device is in the DeviceComplete manufacturing state and cannot be \
                         prepared"
                            .to_string(),
                    ))
                } else {
                    Step::to(S::CheckingIfShouldRecover).with(Progress::Info(format!(
                        "Device is not completed. Manufacturing state: {observed}"
                    )))
                }
            }
            (S::CheckingIfShouldRecover, E::RecoveryFactsGathered(facts)) => {
                // Always recorded by the first state before this one runs
                let observed = self
                    .context
                    .manufacturing_state
                    .unwrap_or(ManufacturingState::Blank);
                match recovery_reason(observed, &self.expected_os_version, &facts) {
                    Some(reason) => {
                        let step = Step::to(S::Recovering).with(Progress::Info(format!(
                            "Device needs to be recovered. Reason: {reason}"
                        )));
                        self.context.recovery_reason = Some(reason);
                        step
                    }
                    None => Step::to(S::CheckingIfAlreadyInstalled).with(Progress::Info(
                        "Device does not need to be recovered".to_string(),
                    )),
                }
            }
            (S::Recovering, E::Recovered) => {
                self.context.recovered = true;
                Step::to(S::CheckingIfAlreadyInstalled)
                    .with(Progress::Success("Device recovered successfully".to_string()))
            }
            (S::Recovering, E::Failed(error)) => {
                let message = format!("Recovery failed: {error}");
                Step::to(S::Error(error)).with(Progress::Failure(message))
            }
            (S::CheckingIfAlreadyInstalled, E::InstalledImagesListed(installed)) => {
                if images_equal(&self.expected_images(), &installed) {
                    Step::to(S::Done).with(Progress::Info(
                        "Images are already installed on the device".to_string(),
                    ))
                } else {
                    self.context.pending = self.packages_to_install(&installed);
                    Step::to(S::SideloadingImages)
                        .with(Progress::Info("Images are not already installed".to_string()))
                }
            }
            (S::SideloadingImages, E::ImagesSideloaded { count }) => {
                self.context.images_sideloaded = count;
                Step::to(S::Done)
                    .with(Progress::Success("Images sideloaded successfully".to_string()))
            }
            (S::SideloadingImages, E::Failed(error)) => {
                let message = format!("Sideloading failed! {error}");
                Step::to(S::Error(error)).with(Progress::Failure(message))
            }
            (_, E::Failed(error)) => {
                let message = error.to_string();
                Step::to(S::Error(error)).with(Progress::Failure(message))
            }
            (state, event) => {
                let error = DeviceCommandError::Failed {
                    operation: STAGE.to_string(),
                    message: format!("unexpected event {event:?} in state {state:?}"),
                };
                Step::to(S::Error(error.clone())).with(Progress::Failure(error.to_string()))
            }
        }
    }

    async fn perform(&self, effect: SideloadEffect, session: &DeviceSession) -> SideloadEvent {
        let outcome = match effect {
            SideloadEffect::ReadManufacturingState => session
                .manufacturing_state()
                .await
                .map(SideloadEvent::ManufacturingStateRead),
            SideloadEffect::GatherRecoveryFacts => gather_recovery_facts(session)
                .await
                .map(SideloadEvent::RecoveryFactsGathered),
            SideloadEffect::Recover => session.recover().await.map(|_| SideloadEvent::Recovered),
            SideloadEffect::ListInstalledImages => session
                .installed_images()
                .await
                .map(SideloadEvent::InstalledImagesListed),
            SideloadEffect::SideloadImages(paths) => sideload_sequentially(&paths, session).await,
        };
        outcome.unwrap_or_else(SideloadEvent::Failed)
    }
}

/// One image at a time; the first failure stops the remaining installs
async fn sideload_sequentially(
    paths: &[PathBuf],
    session: &DeviceSession,
) -> Result<SideloadEvent, DeviceCommandError> {
    for (index, path) in paths.iter().enumerate() {
        info!(
            image = index + 1,
            total = paths.len(),
            path = %path.display(),
            "Sideloading image"
        );
        session.sideload_image(path).await?;
    }
    Ok(SideloadEvent::ImagesSideloaded { count: paths.len() })
}

/// Terminal result of a successful sideload run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideloadReport {
    pub manufacturing_state: Option<ManufacturingState>,
    pub recovered: bool,
    pub images_sideloaded: usize,
}

/// Run the sideload workflow to a terminal state
pub async fn sideload_images(
    config: &DeviceConfig,
    session: &DeviceSession,
    observer: &dyn ProgressObserver,
) -> Result<SideloadReport, WorkflowFailure> {
    let mut workflow = ImageSideloadWorkflow::from_config(config);
    match drive(&mut workflow, session, observer).await {
        SideloadState::Error(source) => Err(WorkflowFailure {
            stage: STAGE,
            source,
        }),
        _ => Ok(SideloadReport {
            manufacturing_state: workflow.context.manufacturing_state,
            recovered: workflow.context.recovered,
            images_sideloaded: workflow.context.images_sideloaded,
        }),
    }
}
