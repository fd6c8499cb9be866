//! Local compilation of the native module.
//!
//! The toolchain is an external program driven through its `clean`,
//! `configure` and `build` subcommands. Its output is then moved into the
//! build output location under the canonical artifact name.
//!
//! # Submodules
//!
//! - [`node_gyp`] - `node-gyp` subprocess driver

pub mod node_gyp;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::paths::FsError;
use crate::util::format_limit;

pub use node_gyp::{NodeGyp, build_steps};

/// Failures of the external build toolchain.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("Failed to execute {command}: {source}")]
  Spawn {
    command: String,
    #[source]
    source: io::Error,
  },

  #[error("Failed to execute {command}: {}", describe_exit(.code))]
  Failed { command: String, code: Option<i32> },

  #[error("Failed to execute {command}: timed out after {}", format_limit(.limit))]
  TimedOut { command: String, limit: Duration },
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("code {}", code),
    None => "terminated by signal".to_string(),
  }
}

/// A native build toolchain.
#[async_trait]
pub trait Toolchain: Send + Sync {
  /// Configure and build `target`, cleaning first when `full_rebuild` is set.
  async fn build(&self, target: &str, full_rebuild: bool) -> Result<(), BuildError>;

  /// Move the toolchain's output for `target` to the canonical binary path.
  async fn move_build(&self, target: &str) -> Result<(), FsError>;
}
