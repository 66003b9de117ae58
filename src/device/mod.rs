// Device Module - the attached device as seen by the workflows
//
// Types and the control trait are independent of the vendor tool; the session
// adds timeouts and cancellation on top of any `DeviceControl` implementation.

pub mod types;
pub mod traits;
pub mod session;

#[cfg(test)]
pub mod mocks;

pub use types::{images_equal, DeviceGroup, ExpectedImage, Image, ManufacturingState};
pub use traits::{DeviceCall, DeviceCommandError, DeviceControl};
pub use session::{CallTimeouts, DeviceSession};
