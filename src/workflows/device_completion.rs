//! Top-level "complete" flow
//!
//! ```text
//! CheckingReadiness -> AlreadyCompleted | Completing | NotReady
//! Completing        -> Completed | Error
//! ```
//!
//! The manufacturing state is only written once the readiness check passed.
//! A query that fails during the check is reported as the not-ready reason.

use async_trait::async_trait;

use crate::device::{DeviceCommandError, DeviceSession, ManufacturingState};
use crate::device_config::DeviceConfig;
use crate::workflows::machine::{drive, Step, Workflow};
use crate::workflows::progress::{Progress, ProgressObserver};
use crate::workflows::readiness::{check_readiness, ReadinessIssue, Verdict};
use crate::workflows::WorkflowFailure;

const STAGE: &str = "device completion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    CheckingReadiness,
    Completing,
    AlreadyCompleted,
    Completed,
    NotReady(ReadinessIssue),
    Error(DeviceCommandError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    ReadinessChecked(Verdict),
    StateUpdated,
    Failed(DeviceCommandError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEffect {
    CheckReadiness,
    SetManufacturingState(ManufacturingState),
}

/// Non-error terminal states of a completion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed,
    AlreadyCompleted,
    NotReady(ReadinessIssue),
}

pub struct DeviceCompletionWorkflow {
    config: DeviceConfig,
}

impl DeviceCompletionWorkflow {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Workflow for DeviceCompletionWorkflow {
    type State = CompletionState;
    type Event = CompletionEvent;
    type Effect = CompletionEffect;

    fn name(&self) -> &'static str {
        STAGE
    }

    fn initial(&self) -> CompletionState {
        CompletionState::CheckingReadiness
    }

    fn effect(&self, state: &CompletionState) -> Option<CompletionEffect> {
        match state {
            CompletionState::CheckingReadiness => Some(CompletionEffect::CheckReadiness),
            CompletionState::Completing => Some(CompletionEffect::SetManufacturingState(
                self.config.desired_manufacturing_state,
            )),
            _ => None,
        }
    }

    fn on_entry(&self, state: &CompletionState) -> Option<Progress> {
        match state {
            CompletionState::CheckingReadiness => Some(Progress::Step(
                "Checking if device is ready to complete...".to_string(),
            )),
            CompletionState::Completing => Some(Progress::Step("Completing device...".to_string())),
            _ => None,
        }
    }

    fn transition(
        &mut self,
        state: CompletionState,
        event: CompletionEvent,
    ) -> Step<CompletionState> {
        use CompletionEvent as E;
        use CompletionState as S;

        match (state, event) {
            (S::CheckingReadiness, E::ReadinessChecked(verdict)) => match verdict {
                Verdict::AlreadyComplete => Step::to(S::AlreadyCompleted)
                    .with(Progress::Notice("The device is already completed.".to_string())),
                Verdict::Ready => Step::to(S::Completing)
                    .with(Progress::Info("Device is ready to be completed.".to_string())),
                Verdict::NotReady(issue) => not_ready(issue),
            },
            (S::CheckingReadiness, E::Failed(error)) => {
                not_ready(ReadinessIssue::CheckFailed { error })
            }
            (S::Completing, E::StateUpdated) => Step::to(S::Completed)
                .with(Progress::Success("The device was completed successfully.".to_string())),
            (S::Completing, E::Failed(error)) => {
                let message = format!("There was an error completing the device: {error}");
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

    async fn perform(&self, effect: CompletionEffect, session: &DeviceSession) -> CompletionEvent {
        let outcome = match effect {
            CompletionEffect::CheckReadiness => check_readiness(&self.config, session)
                .await
                .map(CompletionEvent::ReadinessChecked),
            CompletionEffect::SetManufacturingState(state) => session
                .set_manufacturing_state(state)
                .await
                .map(|_| CompletionEvent::StateUpdated),
        };
        outcome.unwrap_or_else(CompletionEvent::Failed)
    }
}

fn not_ready(issue: ReadinessIssue) -> Step<CompletionState> {
    let message = format!("Device not ready to be completed. Reason: {issue}");
    Step::to(CompletionState::NotReady(issue)).with(Progress::Info(message))
}

/// Check readiness and, if the device passes, move it to the desired state
pub async fn complete_device(
    config: &DeviceConfig,
    session: &DeviceSession,
    observer: &dyn ProgressObserver,
) -> Result<CompletionOutcome, WorkflowFailure> {
    let mut workflow = DeviceCompletionWorkflow::new(config.clone());
    match drive(&mut workflow, session, observer).await {
        CompletionState::Completed => Ok(CompletionOutcome::Completed),
        CompletionState::AlreadyCompleted => Ok(CompletionOutcome::AlreadyCompleted),
        CompletionState::NotReady(issue) => Ok(CompletionOutcome::NotReady(issue)),
        CompletionState::Error(source) => Err(WorkflowFailure {
            stage: STAGE,
            source,
        }),
        state => Err(WorkflowFailure {
            stage: STAGE,
            source: DeviceCommandError::Failed {
                operation: STAGE.to_string(),
                message: format!("stopped in non-terminal state {state:?}"),
            },
        }),
    }
}
