//! Azure Sphere CLI adapter
//!
//! Implements [`DeviceControl`] by shelling out to the `azsphere` tool and
//! parsing its output. Each method maps to exactly one invocation.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::trace;

use super::command::CommandExecutor;
use crate::device::{
    DeviceCall, DeviceCommandError, DeviceControl, DeviceGroup, Image, ManufacturingState,
};

static WIFI_NETWORK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID\s+:\s\d+").expect("valid wifi id pattern"));

static OS_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Azure Sphere OS version (.+)\.").expect("valid os version pattern")
});

/// `DeviceControl` backed by the vendor CLI
pub struct AzSphereCli {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    device: Option<String>,
}

impl AzSphereCli {
    pub fn new(executor: Arc<dyn CommandExecutor>, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
            device: None,
        }
    }

    /// Target a specific attached device instead of the tool's default
    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    async fn run(&self, call: &DeviceCall, args: &[&str]) -> Result<String, DeviceCommandError> {
        let mut full_args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if let Some(device) = &self.device {
            full_args.push("--device".to_string());
            full_args.push(device.clone());
        }
        trace!(program = %self.program, args = ?full_args, "invoking vendor tool");

        let output = self
            .executor
            .execute(&self.program, &full_args)
            .await
            .map_err(|e| DeviceCommandError::failed(call, e.to_string()))?;

        if !output.success() {
            return Err(DeviceCommandError::failed(
                call,
                format!(
                    "{} exited with code {}: {}",
                    self.program,
                    output.status_code,
                    output.stderr.trim()
                ),
            ));
        }

        Ok(output.stdout.trim().to_string())
    }
}

#[async_trait]
impl DeviceControl for AzSphereCli {
    async fn manufacturing_state(&self) -> Result<ManufacturingState, DeviceCommandError> {
        let call = DeviceCall::GetManufacturingState;
        let stdout = self
            .run(&call, &["device", "manufacturing-state", "show", "--output", "json"])
            .await?;
        parse_manufacturing_state(&stdout).map_err(|e| DeviceCommandError::failed(&call, e))
    }

    async fn sdk_version(&self) -> Result<String, DeviceCommandError> {
        let call = DeviceCall::GetSdkVersion;
        let stdout = self.run(&call, &["show-version", "--output", "json"]).await?;
        parse_sdk_version(&stdout).map_err(|e| DeviceCommandError::failed(&call, e))
    }

    async fn capabilities(&self) -> Result<Vec<String>, DeviceCommandError> {
        let call = DeviceCall::GetCapabilities;
        let stdout = self
            .run(&call, &["device", "capability", "show-attached", "--output", "json"])
            .await?;
        parse_capabilities(&stdout).map_err(|e| DeviceCommandError::failed(&call, e))
    }

    async fn installed_images(&self) -> Result<Vec<Image>, DeviceCommandError> {
        let call = DeviceCall::GetInstalledImages;
        let stdout = self
            .run(&call, &["device", "image", "list-installed"])
            .await?;
        parse_installed_images(&stdout).map_err(|e| DeviceCommandError::failed(&call, e))
    }

    async fn os_version(&self) -> Result<String, DeviceCommandError> {
        let call = DeviceCall::GetOsVersion;
        let stdout = self.run(&call, &["device", "show-os-version"]).await?;
        parse_os_version(&stdout).map_err(|e| DeviceCommandError::failed(&call, e))
    }

    async fn wifi_network_count(&self) -> Result<usize, DeviceCommandError> {
        let stdout = self
            .run(&DeviceCall::GetWifiNetworkCount, &["device", "wifi", "list"])
            .await?;
        Ok(count_wifi_networks(&stdout))
    }

    async fn sideload_image(&self, path: &Path) -> Result<(), DeviceCommandError> {
        let call = DeviceCall::SideloadImage {
            path: path.to_path_buf(),
        };
        let package = path.to_string_lossy();
        self.run(
            &call,
            &["device", "sideload", "deploy", "--image-package", &*package],
        )
        .await
        .map(drop)
    }

    async fn recover(&self) -> Result<(), DeviceCommandError> {
        self.run(&DeviceCall::Recover, &["device", "recover"])
            .await
            .map(drop)
    }

    async fn claim(&self) -> Result<(), DeviceCommandError> {
        self.run(&DeviceCall::Claim, &["device", "claim", "--force"])
            .await
            .map(drop)
    }

    async fn update_device_group(&self, group: &DeviceGroup) -> Result<(), DeviceCommandError> {
        let call = DeviceCall::UpdateDeviceGroup {
            group: group.clone(),
        };
        let target = group.to_string();
        self.run(&call, &["device", "update", "--device-group", target.as_str()])
            .await
            .map(drop)
    }

    async fn set_manufacturing_state(
        &self,
        state: ManufacturingState,
    ) -> Result<(), DeviceCommandError> {
        self.run(
            &DeviceCall::SetManufacturingState { state },
            &["device", "manufacturing-state", "update", "--state", state.as_str()],
        )
        .await
        .map(drop)
    }
}

/// Parse `{"manufacturingState": "..."}`
pub fn parse_manufacturing_state(stdout: &str) -> Result<ManufacturingState, String> {
    let json: serde_json::Value =
        serde_json::from_str(stdout).map_err(|e| format!("invalid JSON output: {e}"))?;
    let state = json
        .get("manufacturingState")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "missing manufacturingState field".to_string())?;
    state
        .parse::<ManufacturingState>()
        .map_err(|e| e.to_string())
}

/// Parse `{"Azure Sphere SDK": "..."}`
pub fn parse_sdk_version(stdout: &str) -> Result<String, String> {
    let json: serde_json::Value =
        serde_json::from_str(stdout).map_err(|e| format!("invalid JSON output: {e}"))?;
    json.get("Azure Sphere SDK")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| "missing Azure Sphere SDK field".to_string())
}

/// Parse the JSON list of attached capabilities; no output means none configured.
///
/// Only the number of entries matters, so non-string elements are kept in
/// their JSON form instead of being rejected.
pub fn parse_capabilities(stdout: &str) -> Result<Vec<String>, String> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(stdout).map_err(|e| format!("invalid capability list: {e}"))?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

pub fn count_wifi_networks(stdout: &str) -> usize {
    WIFI_NETWORK_ID.find_iter(stdout).count()
}

pub fn parse_os_version(stdout: &str) -> Result<String, String> {
    OS_VERSION
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| "could not find the device OS version in the output".to_string())
}

/// Parse `device image list-installed` output.
///
/// ```text
/// Installed images:
///  --> NW Kernel
///    --> Image type:   System software image type 7
///    --> Component ID: ec96028b-080b-4ff5-9ef1-b40264a8c652
///    --> Image ID:     039b4c3f-7d1c-4354-98de-3fbdea90eabc
/// ```
pub fn parse_installed_images(stdout: &str) -> Result<Vec<Image>, String> {
    struct Entry {
        name: String,
        component_id: Option<String>,
        image_id: Option<String>,
    }

    let mut entries: Vec<Entry> = Vec::new();
    for line in stdout.lines() {
        if line.starts_with("Installed images:") || line.trim().is_empty() {
            continue;
        }
        let body = line.trim_start();
        let indent = line.len() - body.len();
        if indent <= 1 && body.starts_with("-->") {
            entries.push(Entry {
                name: body.trim_start_matches("-->").trim().to_string(),
                component_id: None,
                image_id: None,
            });
            continue;
        }
        let (Some(entry), Some((key, value))) = (entries.last_mut(), body.split_once(':')) else {
            continue;
        };
        if key.contains("Component ID") {
            entry.component_id = Some(value.trim().to_string());
        } else if key.contains("Image ID") {
            entry.image_id = Some(value.trim().to_string());
        }
    }

    entries
        .into_iter()
        .map(|entry| match entry.image_id {
            Some(image_id) => Ok(Image {
                component_id: entry.component_id.unwrap_or_default(),
                image_id,
            }),
            None => Err(format!("image `{}` has no Image ID", entry.name)),
        })
        .collect()
}
