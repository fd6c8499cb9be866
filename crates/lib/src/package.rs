//! Package manifest access.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::consts::PACKAGE_MANIFEST;
use crate::config::ConfigError;

/// Name and version of the package that ships the native module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageMeta {
  #[serde(default)]
  pub name: String,
  #[serde(default, deserialize_with = "version_string")]
  pub version: String,
}

impl PackageMeta {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
    }
  }

  /// Read `package.json` from the package root.
  ///
  /// Missing fields are left empty; the identity resolver rejects them.
  pub fn read(package_root: &Path) -> Result<Self, ConfigError> {
    let path = package_root.join(PACKAGE_MANIFEST);
    debug!(path = ?path, "reading package manifest");

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ManifestRead {
      path: path.clone(),
      source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::ManifestParse { path, source })
  }
}

/// Accept versions written as strings or bare numbers.
fn version_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let value = serde_json::Value::deserialize(deserializer)?;
  Ok(match value {
    serde_json::Value::String(s) => s,
    serde_json::Value::Null => String::new(),
    other => other.to_string(),
  })
}
