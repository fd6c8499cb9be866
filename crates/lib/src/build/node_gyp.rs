//! `node-gyp` subprocess driver.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::build::{BuildError, Toolchain};
use crate::config::Settings;
use crate::consts::BINARY_SUFFIX;
use crate::dispatch::RuntimeOptions;
use crate::identity::ArtifactId;
use crate::paths::FsError;
use crate::platform;

/// Drives `node-gyp` (or a compatible program) in the package root.
#[derive(Debug, Clone)]
pub struct NodeGyp {
  program: String,
  leading_args: Vec<String>,
  package_root: PathBuf,
  build_dir: PathBuf,
  binary_file_name: String,
  quiet: bool,
  windows: bool,
  jobs: usize,
  timeout: Option<Duration>,
}

impl NodeGyp {
  /// Create a driver for the configured toolchain.
  ///
  /// `settings.node_gyp` may carry leading arguments (`npx node-gyp`); it is
  /// split on whitespace.
  pub fn new(settings: &Settings, id: &ArtifactId, options: &RuntimeOptions) -> Self {
    let mut words = settings.node_gyp.split_whitespace().map(str::to_string);
    let program = words.next().unwrap_or_default();
    let leading_args = words.collect();

    Self {
      program,
      leading_args,
      package_root: settings.package_root.clone(),
      build_dir: settings.build_dir(),
      binary_file_name: id.binary_file_name(),
      quiet: options.quiet(),
      windows: cfg!(windows),
      jobs: platform::jobs(),
      timeout: settings.build_timeout,
    }
  }

  pub fn with_jobs(mut self, jobs: usize) -> Self {
    self.jobs = jobs.max(1);
    self
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Run one toolchain invocation to completion.
  async fn run(&self, args: &[String]) -> Result<(), BuildError> {
    let command_line = self.describe(args);
    info!("> {}", command_line);

    let mut command = Command::new(&self.program);
    command
      .args(&self.leading_args)
      .args(args)
      .current_dir(&self.package_root)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    if self.quiet {
      command.stdout(Stdio::null()).stderr(Stdio::null());
    } else {
      command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    debug!(program = %self.program, cwd = ?self.package_root, "spawning toolchain");

    let mut child = command.spawn().map_err(|source| BuildError::Spawn {
      command: command_line.clone(),
      source,
    })?;

    let waited = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
        Ok(waited) => waited,
        Err(_) => {
          if let Err(err) = child.kill().await {
            debug!(error = %err, "failed to kill timed out toolchain");
          }
          return Err(BuildError::TimedOut {
            command: command_line,
            limit,
          });
        }
      },
      None => child.wait().await,
    };

    let status = waited.map_err(|source| BuildError::Spawn {
      command: command_line.clone(),
      source,
    })?;

    if !status.success() {
      return Err(BuildError::Failed {
        command: command_line,
        code: status.code(),
      });
    }

    Ok(())
  }

  fn describe(&self, args: &[String]) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.leading_args.iter().map(String::as_str))
      .chain(args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[async_trait]
impl Toolchain for NodeGyp {
  async fn build(&self, target: &str, full_rebuild: bool) -> Result<(), BuildError> {
    for step in build_steps(target, full_rebuild, self.jobs, self.windows) {
      self.run(&step).await?;
    }
    Ok(())
  }

  async fn move_build(&self, target: &str) -> Result<(), FsError> {
    let from = self.build_dir.join(format!("{}{}", target, BINARY_SUFFIX));
    let to = self.build_dir.join(&self.binary_file_name);
    debug!(from = ?from, to = ?to, "moving build output");

    tokio::fs::rename(&from, &to)
      .await
      .map_err(|source| FsError::Rename { from, to, source })
  }
}

/// Toolchain invocations for one build, in order.
///
/// The target is addressed as an MSBuild target (`/t:<name>`) on Windows.
pub fn build_steps(target: &str, full_rebuild: bool, jobs: usize, windows: bool) -> Vec<Vec<String>> {
  let prepare: &[&str] = if full_rebuild { &["clean", "configure"] } else { &["configure"] };
  let target = if windows { format!("/t:{}", target) } else { target.to_string() };

  vec![
    prepare.iter().map(|arg| arg.to_string()).collect(),
    vec!["build".to_string(), "-j".to_string(), jobs.to_string(), target],
  ]
}
