//! Process-wide settings.
//!
//! Settings are resolved once at startup from constants and `PREBUILD_*`
//! environment overrides, then passed by reference to every component.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::consts::{BUILD_OUTPUT_DIR, DEFAULT_TARGET, DOWNLOAD_HOST, NODE_GYP, REMOTE_PATH, UPLOAD_BUCKET};

pub const ENV_PACKAGE_ROOT: &str = "PREBUILD_PACKAGE_ROOT";
pub const ENV_ABI: &str = "PREBUILD_ABI";
pub const ENV_DOWNLOAD_HOST: &str = "PREBUILD_DOWNLOAD_HOST";
pub const ENV_REMOTE_PATH: &str = "PREBUILD_REMOTE_PATH";
pub const ENV_BUCKET: &str = "PREBUILD_BUCKET";
pub const ENV_NODE_GYP: &str = "PREBUILD_NODE_GYP";
pub const ENV_DEFAULT_TARGET: &str = "PREBUILD_DEFAULT_TARGET";
pub const ENV_BUILD_TIMEOUT: &str = "PREBUILD_BUILD_TIMEOUT";
pub const ENV_DOWNLOAD_TIMEOUT: &str = "PREBUILD_DOWNLOAD_TIMEOUT";
pub const ENV_UPLOAD_DIR: &str = "PREBUILD_UPLOAD_DIR";

/// Errors raised while assembling configuration, before any side effect.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Missing information for naming compiled binary: {}", missing.join(", "))]
  MissingIdentity { missing: Vec<&'static str> },

  #[error("failed to read package manifest {path}: {source}")]
  ManifestRead {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse package manifest {path}: {source}")]
  ManifestParse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid duration in {var}={value}: {source}")]
  InvalidDuration {
    var: &'static str,
    value: String,
    #[source]
    source: humantime::DurationError,
  },

  #[error("package root {path} is not accessible: {source}")]
  PackageRoot {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
  /// Absolute directory anchoring all relative path resolution.
  pub package_root: PathBuf,
  /// ABI tag override; probed from `node` when unset.
  pub abi: Option<String>,
  pub download_host: String,
  pub remote_path: String,
  pub bucket: String,
  /// Toolchain executable.
  pub node_gyp: String,
  pub default_target: String,
  pub build_timeout: Option<Duration>,
  pub download_timeout: Option<Duration>,
  /// Publish into this directory instead of the object store.
  pub upload_dir: Option<PathBuf>,
}

impl Settings {
  /// Settings with built-in defaults anchored at `package_root`.
  pub fn new(package_root: impl Into<PathBuf>) -> Self {
    Self {
      package_root: package_root.into(),
      abi: None,
      download_host: DOWNLOAD_HOST.to_string(),
      remote_path: REMOTE_PATH.to_string(),
      bucket: UPLOAD_BUCKET.to_string(),
      node_gyp: NODE_GYP.to_string(),
      default_target: DEFAULT_TARGET.to_string(),
      build_timeout: None,
      download_timeout: None,
      upload_dir: None,
    }
  }

  /// Resolve settings from the environment.
  ///
  /// The package root is `PREBUILD_PACKAGE_ROOT` when set, otherwise the
  /// current directory, and is canonicalized.
  pub fn from_env() -> Result<Self, ConfigError> {
    let root = match env_var(ENV_PACKAGE_ROOT) {
      Some(root) => PathBuf::from(root),
      None => std::env::current_dir().map_err(|source| ConfigError::PackageRoot {
        path: PathBuf::from("."),
        source,
      })?,
    };
    let root = dunce::canonicalize(&root).map_err(|source| ConfigError::PackageRoot { path: root, source })?;

    let mut settings = Self::new(root);
    settings.abi = env_var(ENV_ABI);
    if let Some(host) = env_var(ENV_DOWNLOAD_HOST) {
      settings.download_host = host;
    }
    if let Some(path) = env_var(ENV_REMOTE_PATH) {
      settings.remote_path = path;
    }
    if let Some(bucket) = env_var(ENV_BUCKET) {
      settings.bucket = bucket;
    }
    if let Some(node_gyp) = env_var(ENV_NODE_GYP) {
      settings.node_gyp = node_gyp;
    }
    if let Some(target) = env_var(ENV_DEFAULT_TARGET) {
      settings.default_target = target;
    }
    settings.build_timeout = env_duration(ENV_BUILD_TIMEOUT)?;
    settings.download_timeout = env_duration(ENV_DOWNLOAD_TIMEOUT)?;
    settings.upload_dir = env_var(ENV_UPLOAD_DIR).map(PathBuf::from);

    debug!(root = ?settings.package_root, host = %settings.download_host, "settings resolved");
    Ok(settings)
  }

  /// Canonical directory for the final binary.
  pub fn build_dir(&self) -> PathBuf {
    self.package_root.join(BUILD_OUTPUT_DIR)
  }

  /// Canonical location of a binary inside the build directory.
  pub fn binary_path(&self, binary_file_name: &str) -> PathBuf {
    self.build_dir().join(binary_file_name)
  }

  /// Remote URL of a compressed package: `{host}/{remote_path}/{file}`.
  pub fn download_url(&self, package_file_name: &str) -> String {
    format!(
      "{}/{}",
      self.download_host.trim_end_matches('/'),
      self.upload_key(package_file_name)
    )
  }

  /// Object-store key of a compressed package: `{remote_path}/{file}`.
  pub fn upload_key(&self, package_file_name: &str) -> String {
    let prefix = self.remote_path.trim_matches('/');
    if prefix.is_empty() {
      package_file_name.to_string()
    } else {
      format!("{}/{}", prefix, package_file_name)
    }
  }

  pub fn package_root(&self) -> &Path {
    &self.package_root
  }
}

fn env_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_duration(name: &'static str) -> Result<Option<Duration>, ConfigError> {
  env_var(name)
    .map(|value| {
      humantime::parse_duration(&value).map_err(|source| ConfigError::InvalidDuration {
        var: name,
        value,
        source,
      })
    })
    .transpose()
}
