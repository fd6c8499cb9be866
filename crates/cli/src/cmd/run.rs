//! Implementation of the `prebuild <command>` entry point.
//!
//! Resolves settings from the environment, dispatches the invocation and
//! reports the artifact it acted on.

use anyhow::{Result, anyhow};
use tracing::debug;

use prebuild_lib::config::Settings;
use prebuild_lib::dispatch::{Invocation, execute};

use crate::output::{print_json, print_stat, print_success};

/// Run one invocation and print its outcome.
///
/// Errors are already rendered as `Failed to execute <cmd>: <error>`; the
/// caller only has to print them.
pub async fn cmd_run(invocation: &Invocation, json: bool) -> Result<()> {
  let name = invocation.command_name().unwrap_or("command").to_string();

  let fail = |err: &dyn std::fmt::Display| anyhow!("Failed to execute {}: {}", name, err);

  let settings = Settings::from_env().map_err(|err| fail(&err))?;
  debug!(root = ?settings.package_root, "running {}", name);

  let id = execute(invocation, &settings).await.map_err(|err| fail(&err))?;
  let binary_path = settings.binary_path(&id.binary_file_name());

  if json {
    print_json(&serde_json::json!({
      "command": name,
      "artifact": id.to_string(),
      "binary": binary_path,
    }))?;
  } else {
    print_success(&format!("{} successful: {}", name, id));
    if invocation.options().verbose() {
      print_stat("Binary", &binary_path.display().to_string());
    }
  }

  Ok(())
}
