//! Readiness evaluation
//!
//! Pure checks comparing what the device reports against the expected
//! configuration. Both the completion check and the recovery gate of the
//! sideload workflow live here so their ordering rules sit side by side.

use std::fmt;

use crate::device::{images_equal, DeviceCommandError, DeviceSession, Image, ManufacturingState};
use crate::device_config::DeviceConfig;

/// Everything the completion check needs to know about the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFacts {
    pub manufacturing_state: ManufacturingState,
    pub capabilities: Vec<String>,
    pub installed_images: Vec<Image>,
    pub wifi_network_count: usize,
    pub os_version: String,
}

/// Facts that decide whether a device must be recovered before sideloading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryFacts {
    pub capabilities: Vec<String>,
    pub wifi_network_count: usize,
    pub os_version: String,
}

/// The single root cause reported when a device is not where it should be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessIssue {
    ManufacturingStateMismatch {
        expected: ManufacturingState,
        found: ManufacturingState,
    },
    CapabilitiesConfigured { capabilities: Vec<String> },
    ImagesMismatch,
    OsVersionMismatch { expected: String, found: String },
    WifiNetworksConfigured { count: usize },
    /// A readiness query itself failed, so no verdict could be reached
    CheckFailed { error: DeviceCommandError },
}

impl fmt::Display for ReadinessIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessIssue::ManufacturingStateMismatch { expected, found } => {
                write!(f, "Expected manufacturing state {expected}, but found {found}")
            }
            ReadinessIssue::CapabilitiesConfigured { .. } => {
                write!(f, "Device has capabilities configured")
            }
            ReadinessIssue::ImagesMismatch => {
                write!(f, "Device doesn't have the correct images installed")
            }
            ReadinessIssue::OsVersionMismatch { expected, found } => write!(
                f,
                "Expected device to be running OS version {expected}, but found {found}"
            ),
            ReadinessIssue::WifiNetworksConfigured { .. } => {
                write!(f, "Device has wifi networks configured")
            }
            ReadinessIssue::CheckFailed { error } => write!(f, "Error: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ready,
    NotReady(ReadinessIssue),
    AlreadyComplete,
}

/// Decide whether a device can be completed.
///
/// A `DeviceComplete` device short-circuits everything else. Otherwise the
/// checks run in a fixed order and the first failure is the verdict:
/// manufacturing state, capabilities, images, OS version, wifi networks.
pub fn evaluate(expected: &DeviceConfig, observed: &ObservedFacts) -> Verdict {
    if observed.manufacturing_state.is_complete() {
        return Verdict::AlreadyComplete;
    }

    let expected_images: Vec<Image> = expected.images.iter().map(|i| i.image()).collect();

    let issue = if observed.manufacturing_state != expected.expected_manufacturing_state {
        Some(ReadinessIssue::ManufacturingStateMismatch {
            expected: expected.expected_manufacturing_state,
            found: observed.manufacturing_state,
        })
    } else if !observed.capabilities.is_empty() {
        Some(ReadinessIssue::CapabilitiesConfigured {
            capabilities: observed.capabilities.clone(),
        })
    } else if !images_equal(&expected_images, &observed.installed_images) {
        Some(ReadinessIssue::ImagesMismatch)
    } else if observed.os_version != expected.expected_os_version {
        Some(ReadinessIssue::OsVersionMismatch {
            expected: expected.expected_os_version.clone(),
            found: observed.os_version.clone(),
        })
    } else if observed.wifi_network_count > 0 {
        Some(ReadinessIssue::WifiNetworksConfigured {
            count: observed.wifi_network_count,
        })
    } else {
        None
    };

    match issue {
        Some(issue) => Verdict::NotReady(issue),
        None => Verdict::Ready,
    }
}

/// Why a device needs recovery before images are sideloaded, if it does.
///
/// Capabilities only count when the device has left the `Blank` state.
pub fn recovery_reason(
    state: ManufacturingState,
    expected_os_version: &str,
    facts: &RecoveryFacts,
) -> Option<ReadinessIssue> {
    if state != ManufacturingState::Blank && !facts.capabilities.is_empty() {
        Some(ReadinessIssue::CapabilitiesConfigured {
            capabilities: facts.capabilities.clone(),
        })
    } else if facts.wifi_network_count > 0 {
        Some(ReadinessIssue::WifiNetworksConfigured {
            count: facts.wifi_network_count,
        })
    } else if facts.os_version != expected_os_version {
        Some(ReadinessIssue::OsVersionMismatch {
            expected: expected_os_version.to_string(),
            found: facts.os_version.clone(),
        })
    } else {
        None
    }
}

/// Query the device and evaluate it.
///
/// The manufacturing state is read first; a completed device needs no further
/// queries. The remaining facts are fetched concurrently and all of them must
/// come back before a verdict is reached.
pub async fn check_readiness(
    expected: &DeviceConfig,
    session: &DeviceSession,
) -> Result<Verdict, DeviceCommandError> {
    let manufacturing_state = session.manufacturing_state().await?;
    if manufacturing_state.is_complete() {
        return Ok(Verdict::AlreadyComplete);
    }

    let (capabilities, installed_images, os_version, wifi_network_count) = tokio::join!(
        session.capabilities(),
        session.installed_images(),
        session.os_version(),
        session.wifi_network_count(),
    );

    let observed = ObservedFacts {
        manufacturing_state,
        capabilities: capabilities?,
        installed_images: installed_images?,
        wifi_network_count: wifi_network_count?,
        os_version: os_version?,
    };
    Ok(evaluate(expected, &observed))
}

/// Fetch the recovery-gate facts concurrently
pub async fn gather_recovery_facts(
    session: &DeviceSession,
) -> Result<RecoveryFacts, DeviceCommandError> {
    let (capabilities, wifi_network_count, os_version) = tokio::join!(
        session.capabilities(),
        session.wifi_network_count(),
        session.os_version(),
    );
    Ok(RecoveryFacts {
        capabilities: capabilities?,
        wifi_network_count: wifi_network_count?,
        os_version: os_version?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mocks::ScriptedDevice;
    use crate::device::{CallTimeouts, DeviceCall};
    use crate::device_config::tests::sample_config;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn session(device: &Arc<ScriptedDevice>) -> DeviceSession {
        DeviceSession::new(device.clone(), CallTimeouts::default(), CancellationToken::new())
    }

    fn ready_facts() -> ObservedFacts {
        ObservedFacts {
            manufacturing_state: ManufacturingState::Module1Complete,
            capabilities: Vec::new(),
            installed_images: vec![Image::new("X", "imgA"), Image::new("Y", "imgB")],
            wifi_network_count: 0,
            os_version: "23.05".to_string(),
        }
    }

    #[test]
    fn test_ready_device() {
        assert_eq!(evaluate(&sample_config(), &ready_facts()), Verdict::Ready);
    }

    #[test]
    fn test_complete_device_short_circuits() {
        let mut facts = ready_facts();
        facts.manufacturing_state = ManufacturingState::DeviceComplete;
        facts.capabilities = vec!["EnableAppDevelopment".to_string()];
        facts.installed_images.clear();
        facts.wifi_network_count = 3;
        facts.os_version = "22.11".to_string();

        assert_eq!(evaluate(&sample_config(), &facts), Verdict::AlreadyComplete);
    }

    #[test]
    fn test_capabilities_reported_before_wifi() {
        let mut facts = ready_facts();
        facts.capabilities = vec!["EnableAppDevelopment".to_string()];
        facts.wifi_network_count = 2;

        match evaluate(&sample_config(), &facts) {
            Verdict::NotReady(issue) => {
                assert!(matches!(issue, ReadinessIssue::CapabilitiesConfigured { .. }));
                assert_eq!(issue.to_string(), "Device has capabilities configured");
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_check_order_is_fixed() {
        let config = sample_config();

        let mut facts = ready_facts();
        facts.manufacturing_state = ManufacturingState::Blank;
        facts.capabilities = vec!["EnableAppDevelopment".to_string()];
        assert!(matches!(
            evaluate(&config, &facts),
            Verdict::NotReady(ReadinessIssue::ManufacturingStateMismatch { .. })
        ));

        let mut facts = ready_facts();
        facts.installed_images.pop();
        facts.os_version = "22.11".to_string();
        assert_eq!(
            evaluate(&config, &facts),
            Verdict::NotReady(ReadinessIssue::ImagesMismatch)
        );

        let mut facts = ready_facts();
        facts.os_version = "22.11".to_string();
        facts.wifi_network_count = 1;
        assert_eq!(
            evaluate(&config, &facts),
            Verdict::NotReady(ReadinessIssue::OsVersionMismatch {
                expected: "23.05".to_string(),
                found: "22.11".to_string(),
            })
        );

        let mut facts = ready_facts();
        facts.wifi_network_count = 1;
        assert_eq!(
            evaluate(&config, &facts),
            Verdict::NotReady(ReadinessIssue::WifiNetworksConfigured { count: 1 })
        );
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let config = sample_config();
        let mut facts = ready_facts();
        facts.os_version = "22.11".to_string();
        let first = evaluate(&config, &facts);
        for _ in 0..10 {
            assert_eq!(evaluate(&config, &facts), first);
        }
    }

    #[test]
    fn test_recovery_gate() {
        let clean = RecoveryFacts {
            capabilities: Vec::new(),
            wifi_network_count: 0,
            os_version: "23.05".to_string(),
        };
        assert_eq!(
            recovery_reason(ManufacturingState::Module1Complete, "23.05", &clean),
            None
        );

        let with_caps = RecoveryFacts {
            capabilities: vec!["EnableAppDevelopment".to_string()],
            ..clean.clone()
        };
        assert!(recovery_reason(ManufacturingState::Blank, "23.05", &with_caps).is_none());
        assert!(matches!(
            recovery_reason(ManufacturingState::Module1Complete, "23.05", &with_caps),
            Some(ReadinessIssue::CapabilitiesConfigured { .. })
        ));

        let with_wifi = RecoveryFacts {
            wifi_network_count: 1,
            os_version: "22.11".to_string(),
            ..clean.clone()
        };
        assert_eq!(
            recovery_reason(ManufacturingState::Blank, "23.05", &with_wifi),
            Some(ReadinessIssue::WifiNetworksConfigured { count: 1 })
        );

        let old_os = RecoveryFacts {
            os_version: "22.11".to_string(),
            ..clean
        };
        assert!(matches!(
            recovery_reason(ManufacturingState::Blank, "23.05", &old_os),
            Some(ReadinessIssue::OsVersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_check_readiness_stops_after_complete_state() {
        let device = Arc::new(ScriptedDevice::new());
        device.set_state(ManufacturingState::DeviceComplete);

        let verdict = check_readiness(&sample_config(), &session(&device))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::AlreadyComplete);
        assert_eq!(device.get_executed_calls(), vec![DeviceCall::GetManufacturingState]);
    }

    #[tokio::test]
    async fn test_check_readiness_waits_for_every_query() {
        let device = Arc::new(ScriptedDevice::new());
        device.fail_on(DeviceCall::GetCapabilities);

        let err = check_readiness(&sample_config(), &session(&device))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceCommandError::Failed { .. }));
        assert!(ReadinessIssue::CheckFailed { error: err }
            .to_string()
            .starts_with("Error: get device capabilities failed"));

        let calls = device.get_executed_calls();
        assert!(calls.contains(&DeviceCall::GetInstalledImages));
        assert!(calls.contains(&DeviceCall::GetOsVersion));
        assert!(calls.contains(&DeviceCall::GetWifiNetworkCount));
    }
}
