// Guarded access to the attached device: per-call timeouts and cooperative cancellation

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::device::traits::{DeviceCall, DeviceCommandError, DeviceControl};
use crate::device::types::{DeviceGroup, Image, ManufacturingState};

/// Upper bounds for each class of device call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    pub query: Duration,
    pub mutation: Duration,
    pub sideload: Duration,
    pub recovery: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            query: Duration::from_secs(60),
            mutation: Duration::from_secs(120),
            sideload: Duration::from_secs(300),
            recovery: Duration::from_secs(900),
        }
    }
}

impl CallTimeouts {
    pub fn for_call(&self, call: &DeviceCall) -> Duration {
        match call {
            DeviceCall::Recover => self.recovery,
            DeviceCall::SideloadImage { .. } => self.sideload,
            call if call.is_mutating() => self.mutation,
            _ => self.query,
        }
    }
}

/// The one device a workflow run drives.
///
/// Every call goes through [`DeviceSession::guarded`], so a hung vendor tool
/// surfaces as [`DeviceCommandError::Timeout`] and Ctrl-C as
/// [`DeviceCommandError::Cancelled`] instead of blocking the run forever.
#[derive(Clone)]
pub struct DeviceSession {
    device: Arc<dyn DeviceControl>,
    timeouts: CallTimeouts,
    cancel: CancellationToken,
}

impl DeviceSession {
    pub fn new(
        device: Arc<dyn DeviceControl>,
        timeouts: CallTimeouts,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device,
            timeouts,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn guarded<T, F>(&self, call: DeviceCall, operation: F) -> Result<T, DeviceCommandError>
    where
        F: Future<Output = Result<T, DeviceCommandError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(DeviceCommandError::Cancelled {
                operation: call.to_string(),
            });
        }

        let limit = self.timeouts.for_call(&call);
        let started = Instant::now();
        debug!(call = %call, timeout_secs = limit.as_secs(), "device call started");

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DeviceCommandError::Cancelled {
                operation: call.to_string(),
            }),
            outcome = tokio::time::timeout(limit, operation) => match outcome {
                Ok(result) => result,
                Err(_) => Err(DeviceCommandError::Timeout {
                    operation: call.to_string(),
                    after: limit,
                }),
            },
        };

        match &result {
            Ok(_) => debug!(
                call = %call,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "device call finished"
            ),
            Err(e) => warn!(call = %call, error = %e, "device call failed"),
        }
        result
    }

    pub async fn manufacturing_state(&self) -> Result<ManufacturingState, DeviceCommandError> {
        self.guarded(
            DeviceCall::GetManufacturingState,
            self.device.manufacturing_state(),
        )
        .await
    }

    pub async fn sdk_version(&self) -> Result<String, DeviceCommandError> {
        self.guarded(DeviceCall::GetSdkVersion, self.device.sdk_version())
            .await
    }

    pub async fn capabilities(&self) -> Result<Vec<String>, DeviceCommandError> {
        self.guarded(DeviceCall::GetCapabilities, self.device.capabilities())
            .await
    }

    pub async fn installed_images(&self) -> Result<Vec<Image>, DeviceCommandError> {
        self.guarded(DeviceCall::GetInstalledImages, self.device.installed_images())
            .await
    }

    pub async fn os_version(&self) -> Result<String, DeviceCommandError> {
        self.guarded(DeviceCall::GetOsVersion, self.device.os_version())
            .await
    }

    pub async fn wifi_network_count(&self) -> Result<usize, DeviceCommandError> {
        self.guarded(
            DeviceCall::GetWifiNetworkCount,
            self.device.wifi_network_count(),
        )
        .await
    }

    pub async fn sideload_image(&self, path: &Path) -> Result<(), DeviceCommandError> {
        let call = DeviceCall::SideloadImage {
            path: path.to_path_buf(),
        };
        self.guarded(call, self.device.sideload_image(path)).await
    }

    pub async fn recover(&self) -> Result<(), DeviceCommandError> {
        self.guarded(DeviceCall::Recover, self.device.recover()).await
    }

    pub async fn claim(&self) -> Result<(), DeviceCommandError> {
        self.guarded(DeviceCall::Claim, self.device.claim()).await
    }

    pub async fn update_device_group(&self, group: &DeviceGroup) -> Result<(), DeviceCommandError> {
        let call = DeviceCall::UpdateDeviceGroup {
            group: group.clone(),
        };
        self.guarded(call, self.device.update_device_group(group))
            .await
    }

    pub async fn set_manufacturing_state(
        &self,
        state: ManufacturingState,
    ) -> Result<(), DeviceCommandError> {
        self.guarded(
            DeviceCall::SetManufacturingState { state },
            self.device.set_manufacturing_state(state),
        )
        .await
    }
}
