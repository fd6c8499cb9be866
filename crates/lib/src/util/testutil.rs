//! Test utilities for prebuild-lib.
//!
//! Helpers for tests that need a stand-in toolchain, gzip fixtures, or
//! in-memory implementations of the build and download seams.

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::build::{BuildError, Toolchain};
use crate::download::{ArtifactSource, DownloadError};
use crate::paths::FsError;

/// Write a shell script standing in for `node-gyp` and return the command
/// that runs it.
///
/// The script is run through `/bin/sh` rather than executed directly, which
/// avoids `ETXTBSY` races between writing the file and spawning it.
#[cfg(unix)]
pub fn fake_toolchain(dir: &Path, script: &str) -> String {
  let path = dir.join("fake-gyp.sh");
  std::fs::write(&path, script).unwrap();
  format!("/bin/sh {}", path.display())
}

/// Gzip `data` in memory.
pub fn gzip(data: &[u8]) -> Vec<u8> {
  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(data).unwrap();
  encoder.finish().unwrap()
}

/// Scripted toolchain: each call pops the next outcome.
pub struct ScriptedToolchain {
  builds: Mutex<VecDeque<Result<(), BuildError>>>,
  moves: Mutex<VecDeque<Result<(), FsError>>>,
  pub build_calls: AtomicUsize,
  pub move_calls: AtomicUsize,
}

impl ScriptedToolchain {
  pub fn new(builds: Vec<Result<(), BuildError>>, moves: Vec<Result<(), FsError>>) -> Self {
    Self {
      builds: Mutex::new(builds.into()),
      moves: Mutex::new(moves.into()),
      build_calls: AtomicUsize::new(0),
      move_calls: AtomicUsize::new(0),
    }
  }

  pub fn failing() -> Self {
    Self::new(vec![Err(build_failure())], vec![])
  }
}

#[async_trait]
impl Toolchain for ScriptedToolchain {
  async fn build(&self, _target: &str, _full_rebuild: bool) -> Result<(), BuildError> {
    self.build_calls.fetch_add(1, Ordering::SeqCst);
    self.builds.lock().unwrap().pop_front().unwrap_or(Ok(()))
  }

  async fn move_build(&self, _target: &str) -> Result<(), FsError> {
    self.move_calls.fetch_add(1, Ordering::SeqCst);
    self.moves.lock().unwrap().pop_front().unwrap_or(Ok(()))
  }
}

/// Scripted artifact source.
pub struct ScriptedSource {
  outcome: Mutex<Option<Result<Vec<u8>, DownloadError>>>,
  pub calls: AtomicUsize,
}

impl ScriptedSource {
  pub fn ok(data: &[u8]) -> Self {
    Self::with(Ok(data.to_vec()))
  }

  pub fn failing() -> Self {
    Self::with(Err(DownloadError::Status {
      url: "https://example.invalid/pkg.gz".to_string(),
      code: 404,
    }))
  }

  fn with(outcome: Result<Vec<u8>, DownloadError>) -> Self {
    Self {
      outcome: Mutex::new(Some(outcome)),
      calls: AtomicUsize::new(0),
    }
  }
}

#[async_trait]
impl ArtifactSource for ScriptedSource {
  async fn download(&self) -> Result<Vec<u8>, DownloadError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .outcome
      .lock()
      .unwrap()
      .take()
      .expect("scripted source downloaded twice")
  }
}

pub fn build_failure() -> BuildError {
  BuildError::Failed {
    command: "node-gyp clean configure".to_string(),
    code: Some(1),
  }
}

pub fn rename_failure() -> FsError {
  FsError::Rename {
    from: "build/Release/native.node".into(),
    to: "build/Release/pkg.node".into(),
    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
  }
}
