// End-to-end runs of the binary against a scripted stand-in for the azsphere CLI
#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// Answers like the vendor tool; every invocation is appended to calls.log.
// FAKE_STATE picks the manufacturing state, FAKE_FAIL names a command prefix that exits 1.
const FAKE_AZSPHERE: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
if [ -n "$FAKE_FAIL" ]; then
  case "$*" in
    "$FAKE_FAIL"*) echo "error: $FAKE_FAIL rejected" >&2; exit 1 ;;
  esac
fi
case "$*" in
  "show-version"*) echo '{"Azure Sphere SDK": "23.05.0.12"}' ;;
  "device manufacturing-state show"*) echo "{\"manufacturingState\": \"${FAKE_STATE:-Module1Complete}\"}" ;;
  "device capability show-attached"*) echo '[]' ;;
  "device image list-installed"*)
    echo 'Installed images:'
    echo ' --> app'
    echo '   --> Image type:   Application'
    echo '   --> Component ID: X'
    echo '   --> Image ID:     imgA'
    ;;
  "device show-os-version"*) echo 'Your device is running Azure Sphere OS version 23.05.' ;;
  "device wifi list"*) echo 'No Wi-Fi networks are stored on the device.' ;;
  *) ;;
esac
"#;

struct Bench {
    dir: TempDir,
}

impl Bench {
    fn new(expected_os_version: &str) -> Self {
        let dir = TempDir::new().unwrap();

        let tool = dir.path().join("azsphere");
        fs::write(&tool, FAKE_AZSPHERE).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        fs::write(dir.path().join("app.imagepackage"), b"pkg").unwrap();
        fs::write(
            dir.path().join("device-config.json"),
            format!(
                r#"{{
                    "expectedOsVersion": "{expected_os_version}",
                    "expectedManufacturingState": "Module1Complete",
                    "desiredManufacturingState": "DeviceComplete",
                    "deviceGroup": "Contoso/Production",
                    "images": [{{ "componentId": "X", "imageId": "imgA", "path": "app.imagepackage" }}]
                }}"#
            ),
        )
        .unwrap();

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn tool(&self) -> PathBuf {
        self.path().join("azsphere")
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::cargo_bin("azsphere-manufacturing").unwrap();
        cmd.current_dir(self.path())
            .env_remove("RUST_LOG")
            .env_remove("FAKE_STATE")
            .env_remove("FAKE_FAIL")
            .arg(subcommand)
            .arg("--device-config")
            .arg("device-config.json")
            .arg("--azsphere-path")
            .arg(self.tool());
        cmd
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[test]
fn test_prepare_claims_and_assigns_group() {
    let bench = Bench::new("23.05");

    bench
        .command("prepare")
        .assert()
        .success()
        .stdout(predicate::str::contains("Images are already installed on the device"))
        .stdout(predicate::str::contains("✅ Device claimed successfully"))
        .stdout(predicate::str::contains("Updating device group to Contoso/Production..."))
        .stdout(predicate::str::contains("ready to be completed"));

    let calls = bench.calls();
    assert_eq!(calls[0], "show-version --output json");
    assert!(calls.contains(&"device claim --force".to_string()));
    assert!(calls.contains(&"device update --device-group Contoso/Production".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("device sideload")));
    assert!(!calls.iter().any(|c| c.starts_with("device recover")));
}

#[test]
fn test_prepare_sideloads_when_os_needs_recovery() {
    let bench = Bench::new("24.01");

    bench
        .command("prepare")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Device needs to be recovered. Reason: Expected device to be running OS version 24.01, but found 23.05",
        ));

    assert!(bench.calls().contains(&"device recover".to_string()));
}

#[test]
fn test_complete_ready_device() {
    let bench = Bench::new("23.05");

    bench
        .command("complete")
        .assert()
        .success()
        .stdout(predicate::str::contains("Device is ready to be completed."))
        .stdout(predicate::str::contains("✅ The device was completed successfully."));

    assert!(bench
        .calls()
        .contains(&"device manufacturing-state update --state DeviceComplete".to_string()));
}

#[test]
fn test_complete_already_completed_device() {
    let bench = Bench::new("23.05");

    bench
        .command("complete")
        .env("FAKE_STATE", "DeviceComplete")
        .assert()
        .success()
        .stdout(predicate::str::contains("❕ The device is already completed."));

    let calls = bench.calls();
    assert!(!calls.iter().any(|c| c.starts_with("device manufacturing-state update")));
    assert!(!calls.iter().any(|c| c.starts_with("device image")));
}

#[test]
fn test_complete_not_ready_exits_with_two() {
    let bench = Bench::new("24.01");

    bench
        .command("complete")
        .assert()
        .code(2)
        .stdout(predicate::str::contains(
            "Device not ready to be completed. Reason: Expected device to be running OS version 24.01, but found 23.05",
        ));

    assert!(!bench
        .calls()
        .iter()
        .any(|c| c.starts_with("device manufacturing-state update")));
}

#[test]
fn test_complete_query_failure_exits_with_two() {
    let bench = Bench::new("23.05");

    bench
        .command("complete")
        .env("FAKE_FAIL", "device show-os-version")
        .assert()
        .code(2)
        .stdout(predicate::str::contains(
            "Device not ready to be completed. Reason: Error: get device OS version failed",
        ))
        .stdout(predicate::str::contains("❌").not());

    assert!(!bench
        .calls()
        .iter()
        .any(|c| c.starts_with("device manufacturing-state update")));
}

#[test]
fn test_vendor_failure_exits_with_one() {
    let bench = Bench::new("23.05");

    bench
        .command("prepare")
        .env("FAKE_FAIL", "device claim")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("❌ Error claiming device"));

    assert!(!bench.calls().iter().any(|c| c.starts_with("device update")));
}

#[test]
fn test_device_selection_reaches_every_call() {
    let bench = Bench::new("23.05");

    bench
        .command("complete")
        .arg("--device")
        .arg("192.168.35.2")
        .assert()
        .success();

    let calls = bench.calls();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|c| c.ends_with("--device 192.168.35.2")));
}

#[test]
fn test_missing_device_config_fails_before_device_access() {
    let bench = Bench::new("23.05");
    fs::remove_file(bench.path().join("device-config.json")).unwrap();

    bench
        .command("prepare")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));

    assert!(bench.calls().is_empty());
}

#[test]
fn test_help_lists_both_commands() {
    Command::cargo_bin("azsphere-manufacturing")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("prepare"))
        .stdout(predicate::str::contains("complete"));
}
