//! Command dispatch.
//!
//! Arguments are split into `--flag` tokens and positionals. The first
//! positional selects the command, the second the build target.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};

use crate::build::{BuildError, NodeGyp, Toolchain};
use crate::config::{ConfigError, Settings};
use crate::download::HttpDownloader;
use crate::identity::{ArtifactId, resolve_identifier};
use crate::install::{InstallError, Installer};
use crate::load::{ArtifactLoader, LibraryLoader, LoadError};
use crate::package::PackageMeta;
use crate::paths::FsError;
use crate::platform::RuntimeInfo;
use crate::upload::{LocalStore, S3Store, UploadError, Uploader};

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("{}", describe_unknown(.0))]
  UnknownCommand(Option<String>),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Filesystem(#[from] FsError),

  #[error(transparent)]
  Install(#[from] InstallError),

  #[error(transparent)]
  Upload(#[from] UploadError),

  #[error(transparent)]
  Load(#[from] LoadError),
}

fn describe_unknown(command: &Option<String>) -> String {
  match command {
    Some(command) => format!("unknown command '{}' (expected one of: build, rebuild, install, upload, load)", command),
    None => "no command given (expected one of: build, rebuild, install, upload, load)".to_string(),
  }
}

/// Boolean flags given as `--name` on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
  flags: BTreeSet<String>,
}

impl RuntimeOptions {
  pub fn from_flags<I, F>(flags: I) -> Self
  where
    I: IntoIterator<Item = F>,
    F: Into<String>,
  {
    Self {
      flags: flags.into_iter().map(Into::into).collect(),
    }
  }

  pub fn is_set(&self, flag: &str) -> bool {
    self.flags.contains(flag)
  }

  /// Suppress toolchain output.
  pub fn quiet(&self) -> bool {
    self.is_set("quiet")
  }

  /// Never fall back to downloading a prebuilt artifact.
  pub fn no_download(&self) -> bool {
    self.is_set("no-download")
  }

  pub fn verbose(&self) -> bool {
    self.is_set("verbose")
  }

  pub fn flags(&self) -> impl Iterator<Item = &str> {
    self.flags.iter().map(String::as_str)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Build,
  Rebuild,
  Install,
  Upload,
  Load,
}

impl Command {
  pub fn as_str(&self) -> &'static str {
    match self {
      Command::Build => "build",
      Command::Rebuild => "rebuild",
      Command::Install => "install",
      Command::Upload => "upload",
      Command::Load => "load",
    }
  }
}

impl FromStr for Command {
  type Err = DispatchError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "build" => Ok(Command::Build),
      "rebuild" => Ok(Command::Rebuild),
      "install" => Ok(Command::Install),
      "upload" => Ok(Command::Upload),
      "load" => Ok(Command::Load),
      other => Err(DispatchError::UnknownCommand(Some(other.to_string()))),
    }
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A parsed command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  command: Option<String>,
  target: Option<String>,
  options: RuntimeOptions,
}

impl Invocation {
  pub fn parse<I, S>(args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut flags = Vec::new();
    let mut positionals = Vec::new();
    for arg in args {
      let arg = arg.as_ref();
      match arg.strip_prefix("--") {
        Some(flag) => flags.push(flag.to_string()),
        None => positionals.push(arg.to_string()),
      }
    }

    let mut positionals = positionals.into_iter();
    Self {
      command: positionals.next(),
      target: positionals.next(),
      options: RuntimeOptions::from_flags(flags),
    }
  }

  /// The command as typed, for messages.
  pub fn command_name(&self) -> Option<&str> {
    self.command.as_deref()
  }

  pub fn command(&self) -> Result<Command, DispatchError> {
    match &self.command {
      Some(name) => name.parse(),
      None => Err(DispatchError::UnknownCommand(None)),
    }
  }

  pub fn target(&self) -> Option<&str> {
    self.target.as_deref()
  }

  pub fn options(&self) -> &RuntimeOptions {
    &self.options
  }
}

/// Resolve the artifact identifier of the package under `settings`.
pub async fn resolve_artifact(settings: &Settings) -> Result<ArtifactId, ConfigError> {
  let meta = PackageMeta::read(&settings.package_root)?;
  let runtime = RuntimeInfo::detect(settings.abi.as_deref()).await;
  resolve_identifier(&meta, &runtime)
}

/// Run one invocation. Returns the artifact identifier it acted on.
pub async fn execute(invocation: &Invocation, settings: &Settings) -> Result<ArtifactId, DispatchError> {
  let command = invocation.command()?;
  let id = resolve_artifact(settings).await?;
  let target = invocation.target().unwrap_or(&settings.default_target);
  let options = invocation.options();
  info!(command = %command, target, artifact = %id, "dispatching");

  match command {
    Command::Build | Command::Rebuild => {
      let toolchain = NodeGyp::new(settings, &id, options);
      toolchain.build(target, command == Command::Rebuild).await?;
      toolchain.move_build(target).await?;
    }
    Command::Install => {
      let installer = Installer::new(
        NodeGyp::new(settings, &id, options),
        HttpDownloader::new(settings, &id),
        settings,
        &id,
        options,
      );
      installer.install(target).await?;
    }
    Command::Upload => {
      let size = match &settings.upload_dir {
        Some(dir) => Uploader::new(LocalStore::new(dir), settings, &id).upload().await?,
        None => Uploader::new(S3Store::from_env().await, settings, &id).upload().await?,
      };
      debug!(size, "artifact published");
    }
    Command::Load => {
      let loader = ArtifactLoader::new(LibraryLoader, settings, &id);
      loader.load()?;
      info!(path = ?loader.path(), "native module loaded");
    }
  }

  Ok(id)
}
