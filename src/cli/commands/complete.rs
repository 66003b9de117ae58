use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info};

use super::{log_sdk_version, Command, RunStatus};
use crate::device::DeviceSession;
use crate::device_config::DeviceConfig;
use crate::workflows::{complete_device, CompletionOutcome, ProgressObserver};

pub struct CompleteCommand {
    pub device_config: PathBuf,
}

impl CompleteCommand {
    pub fn new(device_config: PathBuf) -> Self {
        Self { device_config }
    }
}

impl Command for CompleteCommand {
    async fn execute(
        &self,
        session: &DeviceSession,
        observer: &dyn ProgressObserver,
    ) -> Result<RunStatus> {
        let config = DeviceConfig::load(&self.device_config)
            .context("Cannot complete the device")?;

        log_sdk_version(session).await;

        match complete_device(&config, session, observer).await {
            Ok(CompletionOutcome::Completed) | Ok(CompletionOutcome::AlreadyCompleted) => {
                Ok(RunStatus::Success)
            }
            Ok(CompletionOutcome::NotReady(issue)) => {
                info!(reason = %issue, "Device not ready to be completed");
                Ok(RunStatus::NotReady)
            }
            Err(failure) => {
                error!(stage = failure.stage, error = %failure.source, "Complete failed");
                Ok(RunStatus::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mocks::ScriptedDevice;
    use crate::device::{CallTimeouts, DeviceCall, Image, ManufacturingState};
    use crate::workflows::RecordingObserver;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn write_config(dir: &TempDir) -> PathBuf {
        fs::write(dir.path().join("app.imagepackage"), b"pkg").unwrap();
        let path = dir.path().join("device-config.json");
        fs::write(
            &path,
            r#"{
                "expectedOsVersion": "23.05",
                "expectedManufacturingState": "Module1Complete",
                "desiredManufacturingState": "DeviceComplete",
                "deviceGroup": "Contoso/Production",
                "images": [{ "componentId": "X", "imageId": "imgA", "path": "app.imagepackage" }]
            }"#,
        )
        .unwrap();
        path
    }

    async fn run(device: &Arc<ScriptedDevice>) -> RunStatus {
        let dir = TempDir::new().unwrap();
        let session =
            DeviceSession::new(device.clone(), CallTimeouts::default(), CancellationToken::new());
        CompleteCommand::new(write_config(&dir))
            .execute(&session, &RecordingObserver::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_outcomes_map_to_run_status() {
        let ready = Arc::new(ScriptedDevice::new());
        ready.set_installed_images(vec![Image::new("X", "imgA")]);
        assert_eq!(run(&ready).await, RunStatus::Success);
        assert_eq!(
            *ready.manufacturing_state.lock().unwrap(),
            ManufacturingState::DeviceComplete
        );

        let not_ready = Arc::new(ScriptedDevice::new());
        assert_eq!(run(&not_ready).await, RunStatus::NotReady);

        let broken = Arc::new(ScriptedDevice::new());
        broken.set_installed_images(vec![Image::new("X", "imgA")]);
        broken.fail_on(DeviceCall::SetManufacturingState {
            state: ManufacturingState::DeviceComplete,
        });
        assert_eq!(run(&broken).await, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_readiness_query_is_not_ready() {
        let device = Arc::new(ScriptedDevice::new());
        device.set_installed_images(vec![Image::new("X", "imgA")]);
        device.fail_on(DeviceCall::GetOsVersion);

        assert_eq!(run(&device).await, RunStatus::NotReady);
        assert!(device.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_already_completed_is_success() {
        let device = Arc::new(ScriptedDevice::new());
        device.set_state(ManufacturingState::DeviceComplete);

        assert_eq!(run(&device).await, RunStatus::Success);
        assert!(device.mutating_calls().is_empty());
    }
}
