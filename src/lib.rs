// Library interface for azsphere-manufacturing
// Exposes the provisioning workflows and the device seam for tests and embedding

pub mod cli;
pub mod config;
pub mod device;
pub mod device_config;
pub mod external;
pub mod shutdown;
pub mod telemetry;
pub mod workflows;

pub use device::{DeviceCommandError, DeviceControl, DeviceSession, ManufacturingState};
pub use device_config::{ConfigurationError, DeviceConfig};
pub use workflows::{complete_device, prepare_device, CompletionOutcome, PrepareReport};
