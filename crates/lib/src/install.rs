//! Install orchestration: build locally, fall back to a prebuilt download.
//!
//! ```text
//! Building ──ok──▶ Relocating ──ok──▶ Done
//!    │                 │
//!   err               err
//!    ▼                 ▼
//! Downloading ──ok──▶ Saving ──ok──▶ Done
//!    │                  │
//!   err                err
//!    ▼                  ▼
//!  Failed             Failed
//! ```
//!
//! Every failure is recorded before the machine moves on. If the install
//! ultimately fails, all recorded failures are reported together in order.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::build::{BuildError, Toolchain};
use crate::config::Settings;
use crate::consts::APP_NAME;
use crate::dispatch::RuntimeOptions;
use crate::download::{ArtifactSource, DownloadError};
use crate::identity::ArtifactId;
use crate::paths::{FsError, ensure_path};

/// A single failure recorded during an install.
#[derive(Debug, Error)]
pub enum Failure {
  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Filesystem(#[from] FsError),

  #[error(transparent)]
  Download(#[from] DownloadError),

  #[error("Downloading is disabled.")]
  DownloadDisabled,
}

/// Ordered accumulator of install failures.
#[derive(Debug, Default)]
pub struct Failures(Vec<Failure>);

impl Failures {
  pub fn record(&mut self, failure: impl Into<Failure>) {
    let failure = failure.into();
    warn!(error = %failure, "install step failed");
    self.0.push(failure);
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Failure> {
    self.0.iter()
  }
}

/// Combined error of a failed install.
#[derive(Debug, Error)]
#[error("Failed to install module: {}", join_failures(.failures))]
pub struct InstallError {
  pub failures: Failures,
}

fn join_failures(failures: &Failures) -> String {
  failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Install states.
#[derive(Debug)]
pub enum State {
  Building,
  Relocating,
  Downloading,
  Saving(Vec<u8>),
  Done,
  Failed,
}

impl State {
  pub fn name(&self) -> &'static str {
    match self {
      State::Building => "building",
      State::Relocating => "relocating",
      State::Downloading => "downloading",
      State::Saving(_) => "saving",
      State::Done => "done",
      State::Failed => "failed",
    }
  }
}

/// Drives one install run.
pub struct Installer<T, S> {
  toolchain: T,
  source: S,
  package_root: PathBuf,
  build_dir: PathBuf,
  binary_file_name: String,
  no_download: bool,
}

impl<T: Toolchain, S: ArtifactSource> Installer<T, S> {
  pub fn new(toolchain: T, source: S, settings: &Settings, id: &ArtifactId, options: &RuntimeOptions) -> Self {
    Self {
      toolchain,
      source,
      package_root: settings.package_root.clone(),
      build_dir: settings.build_dir(),
      binary_file_name: id.binary_file_name(),
      no_download: options.no_download(),
    }
  }

  pub fn toolchain(&self) -> &T {
    &self.toolchain
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Canonical path the binary is installed to.
  pub fn binary_path(&self) -> PathBuf {
    self.build_dir.join(&self.binary_file_name)
  }

  /// Build `target` from source, falling back to a download.
  pub async fn install(&self, target: &str) -> Result<(), InstallError> {
    let mut failures = Failures::default();
    let mut state = State::Building;

    loop {
      debug!(state = state.name(), "install state");
      state = match state {
        State::Building => match self.toolchain.build(target, true).await {
          Ok(()) => State::Relocating,
          Err(err) => {
            failures.record(err);
            self.fallback(&mut failures)
          }
        },
        State::Relocating => match self.toolchain.move_build(target).await {
          Ok(()) => State::Done,
          Err(err) => {
            failures.record(err);
            self.fallback(&mut failures)
          }
        },
        State::Downloading => match self.source.download().await {
          Ok(data) => State::Saving(data),
          Err(err) => {
            failures.record(err);
            State::Failed
          }
        },
        State::Saving(data) => match self.save(data).await {
          Ok(()) => State::Done,
          Err(err) => {
            failures.record(err);
            State::Failed
          }
        },
        State::Done => {
          if !failures.is_empty() {
            debug!(recovered = failures.len(), "install recovered from earlier failures");
          }
          info!(path = ?self.binary_path(), "native module installed");
          return Ok(());
        }
        State::Failed => return Err(InstallError { failures }),
      };
    }
  }

  fn fallback(&self, failures: &mut Failures) -> State {
    if self.no_download {
      failures.record(Failure::DownloadDisabled);
      State::Failed
    } else {
      State::Downloading
    }
  }

  async fn save(&self, data: Vec<u8>) -> Result<(), FsError> {
    ensure_path(&self.package_root, &self.build_dir).await?;
    persist(&self.build_dir, &self.binary_path(), data).await
  }
}

/// Write `data` to `dest` through a temporary file in `dir`.
///
/// The rename is atomic, so readers see the old binary or the new one and
/// never a partial write. Concurrent writers race; the last rename wins.
pub async fn persist(dir: &Path, dest: &Path, data: Vec<u8>) -> Result<(), FsError> {
  let dir = dir.to_path_buf();
  let dest = dest.to_path_buf();
  let dest_for_join = dest.clone();

  tokio::task::spawn_blocking(move || {
    let mut file = tempfile::Builder::new()
      .prefix(&format!(".{}-", APP_NAME))
      .suffix(".tmp")
      .tempfile_in(&dir)
      .map_err(|source| FsError::Write {
        path: dir.clone(),
        source,
      })?;

    file.write_all(&data).map_err(|source| FsError::Write {
      path: file.path().to_path_buf(),
      source,
    })?;
    file.as_file().sync_all().map_err(|source| FsError::Write {
      path: file.path().to_path_buf(),
      source,
    })?;

    file.persist(&dest).map_err(|err| FsError::Rename {
      from: err.file.path().to_path_buf(),
      to: dest.clone(),
      source: err.error,
    })?;

    debug!(path = ?dest, size = data.len(), "artifact written");
    Ok(())
  })
  .await
  .map_err(|err| FsError::Write {
    path: dest_for_join,
    source: io::Error::other(err),
  })?
}
