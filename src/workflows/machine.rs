// Explicit finite-state workflows
//
// A workflow is a state tag plus the context it owns. Deciding where to go
// next (`transition`) is pure; talking to the device (`perform`) is the only
// effectful step, and `drive` is the loop that alternates between the two.

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::debug;

use crate::device::DeviceSession;
use crate::workflows::progress::{Progress, ProgressObserver};

/// Result of applying one event to a state
#[derive(Debug, Clone, PartialEq)]
pub struct Step<S> {
    pub next: S,
    pub progress: Vec<Progress>,
}

impl<S> Step<S> {
    pub fn to(next: S) -> Self {
        Self {
            next,
            progress: Vec::new(),
        }
    }

    pub fn with(mut self, progress: Progress) -> Self {
        self.progress.push(progress);
        self
    }
}

#[async_trait]
pub trait Workflow: Send + Sync {
    type State: Clone + Debug + Send + Sync;
    type Event: Debug + Send;
    type Effect: Debug + Send;

    fn name(&self) -> &'static str;

    fn initial(&self) -> Self::State;

    /// Device work a state needs before it can move on; `None` marks a terminal state
    fn effect(&self, state: &Self::State) -> Option<Self::Effect>;

    /// Message shown when a state is entered
    fn on_entry(&self, _state: &Self::State) -> Option<Progress> {
        None
    }

    /// Pure decision: consume an event, update the context, pick the next state
    fn transition(&mut self, state: Self::State, event: Self::Event) -> Step<Self::State>;

    /// Execute an effect against the device and report what happened as an event
    async fn perform(&self, effect: Self::Effect, session: &DeviceSession) -> Self::Event;
}

/// Run a workflow until it reaches a terminal state and return that state
pub async fn drive<W: Workflow>(
    workflow: &mut W,
    session: &DeviceSession,
    observer: &dyn ProgressObserver,
) -> W::State {
    let mut state = workflow.initial();
    loop {
        if let Some(progress) = workflow.on_entry(&state) {
            observer.notify(&progress);
        }

        let Some(effect) = workflow.effect(&state) else {
            debug!(workflow = workflow.name(), state = ?state, "workflow reached terminal state");
            return state;
        };

        debug!(workflow = workflow.name(), state = ?state, effect = ?effect, "performing effect");
        let event = workflow.perform(effect, session).await;

        let from = format!("{state:?}");
        let step = workflow.transition(state, event);
        debug!(workflow = workflow.name(), from = %from, to = ?step.next, "transition");

        for progress in &step.progress {
            observer.notify(progress);
        }
        state = step.next;
    }
}
