use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::error;

use super::{log_sdk_version, Command, RunStatus};
use crate::device::DeviceSession;
use crate::device_config::DeviceConfig;
use crate::workflows::{prepare_device, Progress, ProgressObserver};

pub struct PrepareCommand {
    pub device_config: PathBuf,
}

impl PrepareCommand {
    pub fn new(device_config: PathBuf) -> Self {
        Self { device_config }
    }
}

impl Command for PrepareCommand {
    async fn execute(
        &self,
        session: &DeviceSession,
        observer: &dyn ProgressObserver,
    ) -> Result<RunStatus> {
        let config = DeviceConfig::load(&self.device_config)
            .context("Cannot prepare the device")?;

        log_sdk_version(session).await;

        match prepare_device(&config, session, observer).await {
            Ok(report) => {
                if report.ready_to_complete() {
                    observer.notify(&Progress::Info(
                        "✨ The attached device is ready to be completed. Complete the device by \
                         running the `complete` command"
                            .to_string(),
                    ));
                }
                Ok(RunStatus::Success)
            }
            Err(failure) => {
                error!(stage = failure.stage, error = %failure.source, "Prepare failed");
                Ok(RunStatus::Failed)
            }
        }
    }
}
