//! Runtime identity of the host: platform, architecture, native-module ABI,
//! and the parallelism hint handed to the build toolchain.

pub mod arch;
pub mod os;

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

pub use arch::Arch;
pub use os::Os;

/// Identity of the runtime the artifact is built for.
///
/// Every field is optional: detection failures are not errors here, they
/// surface as missing identity components when the artifact name is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
  pub abi: Option<String>,
  pub platform: Option<Os>,
  pub arch: Option<Arch>,
}

impl RuntimeInfo {
  pub fn new(abi: Option<String>, platform: Option<Os>, arch: Option<Arch>) -> Self {
    Self { abi, platform, arch }
  }

  /// Detect the runtime identity of the current host.
  ///
  /// The ABI tag comes from `abi_override` when set, otherwise it is asked
  /// from the `node` binary.
  pub async fn detect(abi_override: Option<&str>) -> Self {
    let abi = match abi_override {
      Some(abi) => Some(abi.to_string()),
      None => probe_abi("node").await,
    };

    Self {
      abi,
      platform: Os::current(),
      arch: Arch::current(),
    }
  }

  pub fn is_windows(&self) -> bool {
    self.platform.is_some_and(|os| os.is_windows())
  }
}

/// Ask a Node.js binary for its native-module ABI version.
///
/// Returns `None` if the binary cannot be run or prints nothing.
pub async fn probe_abi(node: &str) -> Option<String> {
  let output = Command::new(node)
    .args(["-p", "process.versions.modules"])
    .stdin(Stdio::null())
    .stderr(Stdio::null())
    .output()
    .await;

  let output = match output {
    Ok(output) if output.status.success() => output,
    Ok(output) => {
      debug!(node = %node, code = ?output.status.code(), "abi probe exited unsuccessfully");
      return None;
    }
    Err(err) => {
      debug!(node = %node, error = %err, "abi probe could not be spawned");
      return None;
    }
  };

  let abi = String::from_utf8_lossy(&output.stdout).trim().to_string();
  if abi.is_empty() { None } else { Some(abi) }
}

/// Number of logical CPUs on the host.
pub fn cpu_count() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1)
}

/// Parallelism hint for the toolchain: half the CPUs, rounded half-up, at least one.
pub fn jobs_for(cpus: usize) -> usize {
  cpus.div_ceil(2).max(1)
}

/// Parallelism hint for the current host.
pub fn jobs() -> usize {
  jobs_for(cpu_count())
}
