// Scripted device for testing - records every call, no real hardware

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::device::traits::*;
use crate::device::types::*;

/// In-memory device whose answers are set up by the test
#[derive(Debug)]
pub struct ScriptedDevice {
    pub manufacturing_state: Mutex<ManufacturingState>,
    pub sdk_version: Mutex<String>,
    pub capabilities: Mutex<Vec<String>>,
    pub installed_images: Mutex<Vec<Image>>,
    pub os_version: Mutex<String>,
    pub wifi_network_count: Mutex<usize>,
    pub failing_calls: Mutex<Vec<DeviceCall>>,
    pub hanging_calls: Mutex<Vec<DeviceCall>>,
    pub executed_calls: Mutex<Vec<DeviceCall>>,
    mutations_in_flight: AtomicUsize,
    max_mutations_in_flight: AtomicUsize,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDevice {
    /// A clean `Module1Complete` device on OS 23.05 with nothing installed
    pub fn new() -> Self {
        Self {
            manufacturing_state: Mutex::new(ManufacturingState::Module1Complete),
            sdk_version: Mutex::new("23.05.0.12".to_string()),
            capabilities: Mutex::new(Vec::new()),
            installed_images: Mutex::new(Vec::new()),
            os_version: Mutex::new("23.05".to_string()),
            wifi_network_count: Mutex::new(0),
            failing_calls: Mutex::new(Vec::new()),
            hanging_calls: Mutex::new(Vec::new()),
            executed_calls: Mutex::new(Vec::new()),
            mutations_in_flight: AtomicUsize::new(0),
            max_mutations_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn set_state(&self, state: ManufacturingState) {
        *self.manufacturing_state.lock().unwrap() = state;
    }

    pub fn set_capabilities(&self, capabilities: &[&str]) {
        *self.capabilities.lock().unwrap() = capabilities.iter().map(|c| c.to_string()).collect();
    }

    pub fn set_installed_images(&self, images: Vec<Image>) {
        *self.installed_images.lock().unwrap() = images;
    }

    pub fn set_os_version(&self, version: &str) {
        *self.os_version.lock().unwrap() = version.to_string();
    }

    pub fn set_wifi_network_count(&self, count: usize) {
        *self.wifi_network_count.lock().unwrap() = count;
    }

    pub fn fail_on(&self, call: DeviceCall) {
        self.failing_calls.lock().unwrap().push(call);
    }

    pub fn hang_on(&self, call: DeviceCall) {
        self.hanging_calls.lock().unwrap().push(call);
    }

    pub fn get_executed_calls(&self) -> Vec<DeviceCall> {
        self.executed_calls.lock().unwrap().clone()
    }

    pub fn mutating_calls(&self) -> Vec<DeviceCall> {
        self.get_executed_calls()
            .into_iter()
            .filter(DeviceCall::is_mutating)
            .collect()
    }

    /// Highest number of mutating calls observed running at once
    pub fn max_concurrent_mutations(&self) -> usize {
        self.max_mutations_in_flight.load(Ordering::SeqCst)
    }

    async fn record(&self, call: DeviceCall) -> Result<(), DeviceCommandError> {
        self.executed_calls.lock().unwrap().push(call.clone());

        let mutating = call.is_mutating();
        if mutating {
            let now = self.mutations_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_mutations_in_flight.fetch_max(now, Ordering::SeqCst);
            // Give any concurrently fired mutation a chance to overlap
            tokio::task::yield_now().await;
        }

        let hangs = self.hanging_calls.lock().unwrap().contains(&call);
        if hangs {
            std::future::pending::<()>().await;
        }

        if mutating {
            self.mutations_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let fails = self.failing_calls.lock().unwrap().contains(&call);
        if fails {
            return Err(DeviceCommandError::failed(&call, "scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceControl for ScriptedDevice {
    async fn manufacturing_state(&self) -> Result<ManufacturingState, DeviceCommandError> {
        self.record(DeviceCall::GetManufacturingState).await?;
        Ok(*self.manufacturing_state.lock().unwrap())
    }

    async fn sdk_version(&self) -> Result<String, DeviceCommandError> {
        self.record(DeviceCall::GetSdkVersion).await?;
        Ok(self.sdk_version.lock().unwrap().clone())
    }

    async fn capabilities(&self) -> Result<Vec<String>, DeviceCommandError> {
        self.record(DeviceCall::GetCapabilities).await?;
        Ok(self.capabilities.lock().unwrap().clone())
    }

    async fn installed_images(&self) -> Result<Vec<Image>, DeviceCommandError> {
        self.record(DeviceCall::GetInstalledImages).await?;
        Ok(self.installed_images.lock().unwrap().clone())
    }

    async fn os_version(&self) -> Result<String, DeviceCommandError> {
        self.record(DeviceCall::GetOsVersion).await?;
        Ok(self.os_version.lock().unwrap().clone())
    }

    async fn wifi_network_count(&self) -> Result<usize, DeviceCommandError> {
        self.record(DeviceCall::GetWifiNetworkCount).await?;
        Ok(*self.wifi_network_count.lock().unwrap())
    }

    async fn sideload_image(&self, path: &Path) -> Result<(), DeviceCommandError> {
        self.record(DeviceCall::SideloadImage {
            path: path.to_path_buf(),
        })
        .await
    }

    async fn recover(&self) -> Result<(), DeviceCommandError> {
        self.record(DeviceCall::Recover).await
    }

    async fn claim(&self) -> Result<(), DeviceCommandError> {
        self.record(DeviceCall::Claim).await
    }

    async fn update_device_group(&self, group: &DeviceGroup) -> Result<(), DeviceCommandError> {
        self.record(DeviceCall::UpdateDeviceGroup {
            group: group.clone(),
        })
        .await
    }

    async fn set_manufacturing_state(
        &self,
        state: ManufacturingState,
    ) -> Result<(), DeviceCommandError> {
        self.record(DeviceCall::SetManufacturingState { state }).await?;
        *self.manufacturing_state.lock().unwrap() = state;
        Ok(())
    }
}
