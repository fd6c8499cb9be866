//! Artifact naming.
//!
//! The identifier ties a compiled native module to the package release and
//! runtime it was built for: `{name}-{version}-{abi}-{platform}-{arch}`.

use std::fmt;

use crate::config::ConfigError;
use crate::consts::{ARCHIVE_SUFFIX, BINARY_SUFFIX};
use crate::package::PackageMeta;
use crate::platform::RuntimeInfo;

/// Resolved artifact identifier. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId {
  package_name: String,
  package_version: String,
  abi: String,
  platform: String,
  arch: String,
}

impl ArtifactId {
  /// Build an identifier from raw components.
  ///
  /// Name and version are sanitized; every component must be non-empty.
  pub fn new(name: &str, version: &str, abi: &str, platform: &str, arch: &str) -> Result<Self, ConfigError> {
    let id = Self {
      package_name: sanitize(name),
      package_version: sanitize(version),
      abi: abi.to_string(),
      platform: platform.to_string(),
      arch: arch.to_string(),
    };

    let missing: Vec<&'static str> = [
      ("name", &id.package_name),
      ("version", &id.package_version),
      ("abi", &id.abi),
      ("platform", &id.platform),
      ("arch", &id.arch),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(label, _)| label)
    .collect();

    if !missing.is_empty() {
      return Err(ConfigError::MissingIdentity { missing });
    }

    Ok(id)
  }

  /// File name of the native module inside the build output location.
  pub fn binary_file_name(&self) -> String {
    format!("{}{}", self, BINARY_SUFFIX)
  }

  /// File name of the compressed package in the remote store.
  pub fn package_file_name(&self) -> String {
    format!("{}{}", self, ARCHIVE_SUFFIX)
  }

  pub fn package_name(&self) -> &str {
    &self.package_name
  }

  pub fn package_version(&self) -> &str {
    &self.package_version
  }

  pub fn abi(&self) -> &str {
    &self.abi
  }

  pub fn platform(&self) -> &str {
    &self.platform
  }

  pub fn arch(&self) -> &str {
    &self.arch
  }
}

impl fmt::Display for ArtifactId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}-{}-{}-{}-{}",
      self.package_name, self.package_version, self.abi, self.platform, self.arch
    )
  }
}

/// Derive the artifact identifier for a package on a runtime.
pub fn resolve_identifier(meta: &PackageMeta, runtime: &RuntimeInfo) -> Result<ArtifactId, ConfigError> {
  ArtifactId::new(
    &meta.name,
    &meta.version,
    runtime.abi.as_deref().unwrap_or_default(),
    runtime.platform.map(|os| os.as_str()).unwrap_or_default(),
    runtime.arch.map(|arch| arch.as_str()).unwrap_or_default(),
  )
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(value: &str) -> String {
  value
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
    .collect()
}
