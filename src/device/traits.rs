// Device control interface - the seam between workflows and the attached device

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::device::types::{DeviceGroup, Image, ManufacturingState};

/// Failure of a single device-facing operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceCommandError {
    #[error("{operation} failed: {message}")]
    Failed { operation: String, message: String },
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },
    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

impl DeviceCommandError {
    pub fn failed(call: &DeviceCall, message: impl Into<String>) -> Self {
        DeviceCommandError::Failed {
            operation: call.to_string(),
            message: message.into(),
        }
    }
}

/// Descriptor for one device operation, used for logging, timeouts and test recording
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceCall {
    GetManufacturingState,
    GetSdkVersion,
    GetCapabilities,
    GetInstalledImages,
    GetOsVersion,
    GetWifiNetworkCount,
    SideloadImage { path: PathBuf },
    Recover,
    Claim,
    UpdateDeviceGroup { group: DeviceGroup },
    SetManufacturingState { state: ManufacturingState },
}

impl DeviceCall {
    /// Mutating calls must never overlap with another device operation
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            DeviceCall::SideloadImage { .. }
                | DeviceCall::Recover
                | DeviceCall::Claim
                | DeviceCall::UpdateDeviceGroup { .. }
                | DeviceCall::SetManufacturingState { .. }
        )
    }
}

impl fmt::Display for DeviceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCall::GetManufacturingState => write!(f, "get manufacturing state"),
            DeviceCall::GetSdkVersion => write!(f, "get SDK version"),
            DeviceCall::GetCapabilities => write!(f, "get device capabilities"),
            DeviceCall::GetInstalledImages => write!(f, "list installed images"),
            DeviceCall::GetOsVersion => write!(f, "get device OS version"),
            DeviceCall::GetWifiNetworkCount => write!(f, "list wifi networks"),
            DeviceCall::SideloadImage { path } => write!(f, "sideload {}", path.display()),
            DeviceCall::Recover => write!(f, "recover device"),
            DeviceCall::Claim => write!(f, "claim device"),
            DeviceCall::UpdateDeviceGroup { group } => write!(f, "update device group to {group}"),
            DeviceCall::SetManufacturingState { state } => {
                write!(f, "set manufacturing state to {state}")
            }
        }
    }
}

/// Operations against the single attached device.
///
/// Implementations perform one remote call per method and report any failure
/// as a [`DeviceCommandError`]. Retries, timeouts and ordering are the caller's
/// concern (see [`crate::device::DeviceSession`]).
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Current manufacturing lifecycle state
    async fn manufacturing_state(&self) -> Result<ManufacturingState, DeviceCommandError>;

    /// Version of the vendor SDK driving the device
    async fn sdk_version(&self) -> Result<String, DeviceCommandError>;

    /// Developer/debug capabilities configured on the device
    async fn capabilities(&self) -> Result<Vec<String>, DeviceCommandError>;

    /// Images currently installed
    async fn installed_images(&self) -> Result<Vec<Image>, DeviceCommandError>;

    /// Installed OS version
    async fn os_version(&self) -> Result<String, DeviceCommandError>;

    /// Number of stored wifi networks
    async fn wifi_network_count(&self) -> Result<usize, DeviceCommandError>;

    /// Install one image package from a local path
    async fn sideload_image(&self, path: &Path) -> Result<(), DeviceCommandError>;

    /// Vendor recovery; can take several minutes
    async fn recover(&self) -> Result<(), DeviceCommandError>;

    /// Claim ownership of the device (forced)
    async fn claim(&self) -> Result<(), DeviceCommandError>;

    /// Assign the device to an OTA device group
    async fn update_device_group(&self, group: &DeviceGroup) -> Result<(), DeviceCommandError>;

    /// Move the device to a new manufacturing state
    async fn set_manufacturing_state(
        &self,
        state: ManufacturingState,
    ) -> Result<(), DeviceCommandError>;
}
