#![cfg(feature = "cli")]

use std::process::Command;

fn rtls() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rtls"))
}

#[test]
fn version_reports_package() {
    let output = rtls()
        .args(["--format", "json", "version", "--extended"])
        .output()
        .expect("run rtls version");
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version output is JSON");
    assert_eq!(value["name"], "rtls");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    assert!(value["features"]
        .as_array()
        .is_some_and(|features| features.iter().any(|f| f == "cli")));
}

#[test]
fn identify_reports_missing_ports() {
    let output = rtls()
        .args([
            "--format",
            "json",
            "--log-level",
            "error",
            "identify",
            "/dev/rtls-does-not-exist=ghost",
            "--timeout",
            "100ms",
        ])
        .output()
        .expect("run rtls identify");
    assert_eq!(output.status.code(), Some(3));

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("identify output is JSON");
    assert_eq!(value["failed"], 1);
    assert_eq!(value["devices"][0]["name"], "ghost");
    assert_eq!(value["devices"][0]["role"], "unidentified");
}

#[test]
fn run_without_master_fails_cleanly() {
    let output = rtls()
        .args([
            "--format",
            "json",
            "--log-level",
            "error",
            "run",
            "/dev/rtls-does-not-exist",
            "--timeout",
            "100ms",
        ])
        .output()
        .expect("run rtls run");
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no master"));
}

#[test]
fn bad_target_is_a_usage_error() {
    let output = rtls()
        .args(["run", "/dev/null", "--target", "nope"])
        .output()
        .expect("run rtls run");
    assert_eq!(output.status.code(), Some(64));
}
