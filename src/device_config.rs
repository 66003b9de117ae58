// Expected device configuration - what a provisioned device must look like

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::device::{DeviceGroup, ExpectedImage, ManufacturingState};

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Device config file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("Could not read device config {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid device config {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("expectedOsVersion must not be empty")]
    MissingOsVersion,
    #[error("at least one image must be listed")]
    NoImages,
    #[error("image for component {component_id} has an empty imageId")]
    EmptyImageId { component_id: String },
    #[error("imageId {image_id} is listed more than once")]
    DuplicateImageId { image_id: String },
    #[error("image package not found: {}", .path.display())]
    MissingImagePackage { path: PathBuf },
    #[error("desiredManufacturingState {desired} would move the device backwards from {expected}")]
    StateRegression {
        expected: ManufacturingState,
        desired: ManufacturingState,
    },
    #[error("desiredManufacturingState cannot be Blank")]
    BlankTarget,
}

/// Immutable input to both workflows, loaded once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub expected_os_version: String,
    pub expected_manufacturing_state: ManufacturingState,
    pub desired_manufacturing_state: ManufacturingState,
    pub device_group: DeviceGroup,
    pub images: Vec<ExpectedImage>,
}

impl DeviceConfig {
    /// Read, resolve and validate a JSON device config.
    ///
    /// Relative image paths are resolved against the directory holding the
    /// config file, so a config can travel with its image packages.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigurationError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigurationError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut config: DeviceConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigurationError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(base) = path.parent() {
            config.resolve_image_paths(base);
        }
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            images = config.images.len(),
            device_group = %config.device_group,
            "Loaded device config"
        );
        Ok(config)
    }

    fn resolve_image_paths(&mut self, base: &Path) {
        for image in &mut self.images {
            if image.path.is_relative() {
                image.path = base.join(&image.path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.expected_os_version.trim().is_empty() {
            return Err(ConfigurationError::MissingOsVersion);
        }
        if self.desired_manufacturing_state == ManufacturingState::Blank {
            return Err(ConfigurationError::BlankTarget);
        }
        if !self
            .expected_manufacturing_state
            .can_advance_to(self.desired_manufacturing_state)
        {
            return Err(ConfigurationError::StateRegression {
                expected: self.expected_manufacturing_state,
                desired: self.desired_manufacturing_state,
            });
        }
        if self.images.is_empty() {
            return Err(ConfigurationError::NoImages);
        }

        let mut seen = HashSet::new();
        for image in &self.images {
            if image.image_id.trim().is_empty() {
                return Err(ConfigurationError::EmptyImageId {
                    component_id: image.component_id.clone(),
                });
            }
            if !seen.insert(image.image_id.as_str()) {
                return Err(ConfigurationError::DuplicateImageId {
                    image_id: image.image_id.clone(),
                });
            }
        }
        for image in &self.images {
            if !image.path.exists() {
                return Err(ConfigurationError::MissingImagePackage {
                    path: image.path.clone(),
                });
            }
        }
        Ok(())
    }
}
