// Progress events emitted by workflows and the observers that render them

use std::fmt;
#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Something a workflow wants the operator to know.
///
/// Transitions only describe what happened; rendering is the observer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Entering a stage ("Checking manufacturing state...")
    Step(String),
    /// Neutral fact about the device
    Info(String),
    Success(String),
    /// Not a failure, but worth the operator's attention
    Notice(String),
    Failure(String),
}

impl Progress {
    pub fn message(&self) -> &str {
        match self {
            Progress::Step(m)
            | Progress::Info(m)
            | Progress::Success(m)
            | Progress::Notice(m)
            | Progress::Failure(m) => m,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Step(m) | Progress::Info(m) => write!(f, "{m}"),
            Progress::Success(m) => write!(f, "✅ {m}"),
            Progress::Notice(m) => write!(f, "❕ {m}"),
            Progress::Failure(m) => write!(f, "❌ {m}"),
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    fn notify(&self, progress: &Progress);
}

/// Prints progress for the operator and mirrors it into the structured log
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl ProgressObserver for ConsoleObserver {
    fn notify(&self, progress: &Progress) {
        println!("{progress}");
        match progress {
            Progress::Failure(m) => error!(message = %m, "workflow progress"),
            Progress::Notice(m) => warn!(message = %m, "workflow progress"),
            other => info!(message = %other.message(), "workflow progress"),
        }
    }
}

/// Keeps every event in memory for later inspection
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Progress>>,
}

#[cfg(any(test, feature = "testing"))]
impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Progress> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

#[cfg(any(test, feature = "testing"))]
impl ProgressObserver for RecordingObserver {
    fn notify(&self, progress: &Progress) {
        if let Ok(mut events) = self.events.lock() {
            events.push(progress.clone());
        }
    }
}
