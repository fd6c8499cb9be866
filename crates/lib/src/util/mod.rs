//! Shared utilities.

use std::time::Duration;

#[cfg(test)]
pub mod testutil;

/// Render a timeout for error messages (`1m 30s`).
pub(crate) fn format_limit(limit: &Duration) -> String {
  humantime::format_duration(*limit).to_string()
}
