// OTA enrollment: claim the device, then assign it to its device group.
// Runs unconditionally once invoked; either failure is terminal.

use async_trait::async_trait;

use crate::device::{DeviceCommandError, DeviceGroup, DeviceSession};
use crate::workflows::machine::{drive, Step, Workflow};
use crate::workflows::progress::{Progress, ProgressObserver};
use crate::workflows::WorkflowFailure;

const STAGE: &str = "OTA enrollment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentState {
    ClaimingDevice,
    Claimed,
    Configured,
    Error(DeviceCommandError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentEvent {
    DeviceClaimed,
    GroupUpdated,
    Failed(DeviceCommandError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentEffect {
    Claim,
    UpdateDeviceGroup(DeviceGroup),
}

pub struct OtaEnrollmentWorkflow {
    device_group: DeviceGroup,
}

impl OtaEnrollmentWorkflow {
    pub fn new(device_group: DeviceGroup) -> Self {
        Self { device_group }
    }
}

#[async_trait]
impl Workflow for OtaEnrollmentWorkflow {
    type State = EnrollmentState;
    type Event = EnrollmentEvent;
    type Effect = EnrollmentEffect;

    fn name(&self) -> &'static str {
        STAGE
    }

    fn initial(&self) -> EnrollmentState {
        EnrollmentState::ClaimingDevice
    }

    fn effect(&self, state: &EnrollmentState) -> Option<EnrollmentEffect> {
        match state {
            EnrollmentState::ClaimingDevice => Some(EnrollmentEffect::Claim),
            EnrollmentState::Claimed => {
                Some(EnrollmentEffect::UpdateDeviceGroup(self.device_group.clone()))
            }
            EnrollmentState::Configured | EnrollmentState::Error(_) => None,
        }
    }

    fn on_entry(&self, state: &EnrollmentState) -> Option<Progress> {
        match state {
            EnrollmentState::ClaimingDevice => {
                Some(Progress::Step("Claiming device...".to_string()))
            }
            EnrollmentState::Claimed => Some(Progress::Step(format!(
                "Updating device group to {}...",
                self.device_group
            ))),
            _ => None,
        }
    }

    fn transition(
        &mut self,
        state: EnrollmentState,
        event: EnrollmentEvent,
    ) -> Step<EnrollmentState> {
        match (state, event) {
            (EnrollmentState::ClaimingDevice, EnrollmentEvent::DeviceClaimed) => {
                Step::to(EnrollmentState::Claimed)
                    .with(Progress::Success("Device claimed successfully".to_string()))
            }
            (EnrollmentState::ClaimingDevice, EnrollmentEvent::Failed(error)) => {
                let message = format!("Error claiming device: {error}");
                Step::to(EnrollmentState::Error(error)).with(Progress::Failure(message))
            }
            (EnrollmentState::Claimed, EnrollmentEvent::GroupUpdated) => {
                Step::to(EnrollmentState::Configured)
                    .with(Progress::Success("Device group updated successfully".to_string()))
            }
            (EnrollmentState::Claimed, EnrollmentEvent::Failed(error)) => {
                let message = format!("Error updating device group: {error}");
                Step::to(EnrollmentState::Error(error)).with(Progress::Failure(message))
            }
            (state, event) => {
                let error = DeviceCommandError::Failed {
                    operation: STAGE.to_string(),
                    message: format!("unexpected event {event:?} in state {state:?}"),
                };
                Step::to(EnrollmentState::Error(error.clone()))
                    .with(Progress::Failure(error.to_string()))
            }
        }
    }

    async fn perform(&self, effect: EnrollmentEffect, session: &DeviceSession) -> EnrollmentEvent {
        let outcome = match effect {
            EnrollmentEffect::Claim => {
                session.claim().await.map(|_| EnrollmentEvent::DeviceClaimed)
            }
            EnrollmentEffect::UpdateDeviceGroup(group) => session
                .update_device_group(&group)
                .await
                .map(|_| EnrollmentEvent::GroupUpdated),
        };
        outcome.unwrap_or_else(EnrollmentEvent::Failed)
    }
}

/// Run enrollment to a terminal state. A claimed device stays claimed if the
/// group update fails afterwards.
pub async fn enroll_device(
    device_group: &DeviceGroup,
    session: &DeviceSession,
    observer: &dyn ProgressObserver,
) -> Result<(), WorkflowFailure> {
    let mut workflow = OtaEnrollmentWorkflow::new(device_group.clone());
    match drive(&mut workflow, session, observer).await {
        EnrollmentState::Error(source) => Err(WorkflowFailure {
            stage: STAGE,
            source,
        }),
        _ => Ok(()),
    }
}
