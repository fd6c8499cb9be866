//! CLI smoke tests for prebuild.
//!
//! Each test runs the binary against a throwaway package root with a fake
//! toolchain, so nothing here needs node-gyp or network access.

use std::io::Read;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use flate2::read::GzDecoder;
use predicates::prelude::*;
use prebuild_lib::platform::{Arch, Os};
use tempfile::TempDir;

const MANIFEST: &str = r#"{ "name": "@newrelic/native-metrics", "version": "9.0.1" }"#;

/// Get a Command for the prebuild binary rooted at `root`.
fn prebuild_cmd(root: &Path) -> Command {
  let mut cmd = cargo_bin_cmd!("prebuild");
  cmd
    .env("PREBUILD_PACKAGE_ROOT", root)
    .env("PREBUILD_ABI", "108")
    .env_remove("PREBUILD_UPLOAD_DIR")
    .env_remove("PREBUILD_DOWNLOAD_HOST")
    .env_remove("RUST_LOG");
  cmd
}

/// Create a package root with a manifest.
fn temp_package() -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("package.json"), MANIFEST).unwrap();
  temp
}

/// Write a shell script standing in for node-gyp and return the command
/// that runs it.
#[cfg(unix)]
fn fake_toolchain(dir: &Path, script: &str) -> String {
  let path = dir.join("fake-gyp.sh");
  std::fs::write(&path, script).unwrap();
  format!("/bin/sh {}", path.display())
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  cargo_bin_cmd!("prebuild")
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  cargo_bin_cmd!("prebuild")
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::starts_with("prebuild "));
}

#[test]
fn short_help_flag_works() {
  cargo_bin_cmd!("prebuild")
    .args(["install", "-h"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

// =============================================================================
// Dispatch errors
// =============================================================================

#[test]
fn unknown_command_fails() {
  let temp = temp_package();

  prebuild_cmd(temp.path())
    .arg("deploy")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to execute deploy: unknown command 'deploy'"));
}

#[test]
fn missing_command_fails() {
  let temp = temp_package();

  prebuild_cmd(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("no command given"));
}

#[test]
fn missing_manifest_fails() {
  let temp = TempDir::new().unwrap();

  prebuild_cmd(temp.path())
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to execute build: failed to read package manifest"));
}

#[test]
fn invalid_timeout_fails() {
  let temp = temp_package();

  prebuild_cmd(temp.path())
    .arg("build")
    .env("PREBUILD_BUILD_TIMEOUT", "soon")
    .assert()
    .failure()
    .stderr(predicate::str::contains("PREBUILD_BUILD_TIMEOUT=soon"));
}

// =============================================================================
// build / rebuild / install
// =============================================================================

#[cfg(unix)]
#[test]
fn rebuild_reports_artifact() {
  let temp = temp_package();
  let gyp = fake_toolchain(
    temp.path(),
    "mkdir -p build/Release\ntouch build/Release/native.node",
  );

  prebuild_cmd(temp.path())
    .args(["rebuild", "--quiet"])
    .env("PREBUILD_NODE_GYP", gyp)
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "rebuild successful: _newrelic_native_metrics-9_0_1-108-",
    ));
}

#[cfg(unix)]
#[test]
fn quiet_silences_toolchain_but_not_step_lines() {
  let temp = temp_package();
  let gyp = fake_toolchain(
    temp.path(),
    "echo toolchain-chatter\nmkdir -p build/Release\ntouch build/Release/native.node",
  );

  prebuild_cmd(temp.path())
    .args(["build", "--quiet"])
    .env("PREBUILD_NODE_GYP", gyp)
    .assert()
    .success()
    .stdout(predicate::str::contains("toolchain-chatter").not())
    .stderr(predicate::str::contains("> /bin/sh"))
    .stderr(predicate::str::contains("configure"));
}

#[cfg(unix)]
#[test]
fn unknown_flag_is_accepted_and_dispatched() {
  let temp = temp_package();
  let gyp = fake_toolchain(temp.path(), "exit 1");

  prebuild_cmd(temp.path())
    .args(["install", "native", "--fast", "--no-download", "--quiet"])
    .env("PREBUILD_NODE_GYP", gyp)
    .assert()
    .code(1)
    .stderr(predicate::str::contains("unexpected argument").not())
    .stderr(predicate::str::contains("Failed to execute install: Failed to install module: "))
    .stderr(predicate::str::contains("Downloading is disabled."));
}

#[test]
fn leading_unknown_flag_is_accepted() {
  let temp = temp_package();

  prebuild_cmd(temp.path())
    .args(["--fast", "deploy"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Failed to execute deploy: unknown command 'deploy'"));
}

#[test]
fn load_without_installed_binary_fails() {
  let temp = temp_package();

  prebuild_cmd(temp.path())
    .arg("load")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Failed to execute load: native module not found at"));
}

#[cfg(unix)]
#[test]
fn build_failure_reports_toolchain_exit_code() {
  let temp = temp_package();
  let gyp = fake_toolchain(temp.path(), "exit 2");

  prebuild_cmd(temp.path())
    .args(["build", "--quiet"])
    .env("PREBUILD_NODE_GYP", gyp)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to execute build: Failed to execute"))
    .stderr(predicate::str::contains("configure: code 2"));
}

#[cfg(unix)]
#[test]
fn install_without_download_fails() {
  let temp = temp_package();
  let gyp = fake_toolchain(temp.path(), "exit 1");

  prebuild_cmd(temp.path())
    .args(["install", "--quiet", "--no-download"])
    .env("PREBUILD_NODE_GYP", gyp)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to execute install: Failed to install module: "))
    .stderr(predicate::str::contains("Downloading is disabled."));
}

// =============================================================================
// upload
// =============================================================================

#[test]
fn upload_to_local_store_prints_json() {
  let temp = temp_package();
  let store = temp.path().join("store");
  let build_dir = temp.path().join("build/Release");
  std::fs::create_dir_all(&build_dir).unwrap();

  let output = prebuild_cmd(temp.path())
    .args(["upload", "--json"])
    .env("PREBUILD_UPLOAD_DIR", &store)
    .output()
    .unwrap();
  assert!(!output.status.success(), "upload without a binary must fail");
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("Failed to execute upload: Failed to upload file: "));

  let binary = format!(
    "_newrelic_native_metrics-9_0_1-108-{}-{}.node",
    Os::current().unwrap(),
    Arch::current().unwrap()
  );
  std::fs::write(build_dir.join(&binary), b"native").unwrap();

  prebuild_cmd(temp.path())
    .args(["upload", "--json"])
    .env("PREBUILD_UPLOAD_DIR", &store)
    .assert()
    .success()
    .stdout(predicate::str::contains("\"command\": \"upload\""));

  let key = binary.replace(".node", ".gz");
  let object = std::fs::read(store.join("nr-downloads-main/nodejs_agent/builds").join(key)).unwrap();
  let mut decoded = Vec::new();
  GzDecoder::new(&object[..]).read_to_end(&mut decoded).unwrap();
  assert_eq!(decoded, b"native");
}
