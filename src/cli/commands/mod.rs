use anyhow::Result;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ToolConfig;
use crate::device::DeviceSession;
use crate::external::{AzSphereCli, ProcessCommandExecutor};
use crate::workflows::ProgressObserver;

pub mod complete;
pub mod prepare;

/// How a command run ended, as seen by the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// The device failed a readiness check; not an error
    NotReady,
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::NotReady => 2,
        }
    }
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        ExitCode::from(status.exit_code())
    }
}

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(
        &self,
        session: &DeviceSession,
        observer: &dyn ProgressObserver,
    ) -> Result<RunStatus>;
}

/// Session over the real vendor CLI
pub fn connect(tool: &ToolConfig, cancel: CancellationToken) -> DeviceSession {
    let cli = AzSphereCli::new(Arc::new(ProcessCommandExecutor), tool.azsphere_path.clone())
        .with_device(tool.device.clone());
    DeviceSession::new(Arc::new(cli), tool.call_timeouts(), cancel)
}

/// Record which SDK drives the device; a failure here does not stop the run
pub async fn log_sdk_version(session: &DeviceSession) {
    match session.sdk_version().await {
        Ok(version) => info!(sdk_version = %version, "Azure Sphere SDK"),
        Err(e) => warn!("Could not determine Azure Sphere SDK version: {}", e),
    }
}
