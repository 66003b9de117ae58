// Core device types shared by the vendor adapter and the workflows

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Manufacturing lifecycle stages, declared in progression order.
///
/// A device only ever moves forward through these states; the derived `Ord`
/// follows that progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ManufacturingState {
    /// Pre-provisioned chip straight from the module vendor
    Blank,
    /// Module manufacturing finished, device not yet finalized
    Module1Complete,
    /// Finalized for shipment; reconfiguration is no longer allowed
    DeviceComplete,
}

impl ManufacturingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManufacturingState::Blank => "Blank",
            ManufacturingState::Module1Complete => "Module1Complete",
            ManufacturingState::DeviceComplete => "DeviceComplete",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ManufacturingState::DeviceComplete)
    }

    /// Whether moving from `self` to `target` respects the monotonic lifecycle
    pub fn can_advance_to(&self, target: ManufacturingState) -> bool {
        target >= *self
    }
}

impl fmt::Display for ManufacturingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown manufacturing state: {0}")]
pub struct UnknownManufacturingState(pub String);

impl FromStr for ManufacturingState {
    type Err = UnknownManufacturingState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Blank" => Ok(ManufacturingState::Blank),
            "Module1Complete" => Ok(ManufacturingState::Module1Complete),
            "DeviceComplete" => Ok(ManufacturingState::DeviceComplete),
            other => Err(UnknownManufacturingState(other.to_string())),
        }
    }
}

/// One installed firmware/software component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub component_id: String,
    pub image_id: String,
}

impl Image {
    pub fn new(component_id: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            image_id: image_id.into(),
        }
    }
}

/// An image the device is expected to run, with the local package to install it from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedImage {
    pub component_id: String,
    pub image_id: String,
    pub path: PathBuf,
}

impl ExpectedImage {
    pub fn image(&self) -> Image {
        Image::new(self.component_id.clone(), self.image_id.clone())
    }
}

/// Compare two image sets by image identity.
///
/// Order is ignored and component ids are not compared. Both directions are
/// checked so the result is symmetric even when a side repeats an image id.
pub fn images_equal(left: &[Image], right: &[Image]) -> bool {
    let covers = |a: &[Image], b: &[Image]| {
        a.iter()
            .all(|image| b.iter().any(|other| other.image_id == image.image_id))
    };
    left.len() == right.len() && covers(left, right) && covers(right, left)
}

/// Update target for OTA delivery, written `tenant/group`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceGroup {
    pub tenant: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device group must look like `tenant/group`, got `{0}`")]
pub struct InvalidDeviceGroup(pub String);

impl FromStr for DeviceGroup {
    type Err = InvalidDeviceGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [tenant, group] if !tenant.trim().is_empty() && !group.trim().is_empty() => {
                Ok(DeviceGroup {
                    tenant: tenant.trim().to_string(),
                    group: group.trim().to_string(),
                })
            }
            _ => Err(InvalidDeviceGroup(s.to_string())),
        }
    }
}

impl TryFrom<String> for DeviceGroup {
    type Error = InvalidDeviceGroup;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceGroup> for String {
    fn from(group: DeviceGroup) -> Self {
        group.to_string()
    }
}

impl fmt::Display for DeviceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.group)
    }
}
