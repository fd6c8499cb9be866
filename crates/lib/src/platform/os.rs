use std::fmt;

/// Operating systems in the naming scheme used by Node.js (`process.platform`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
  FreeBsd,
  OpenBsd,
  SunOs,
  Aix,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    Self::from_rust(std::env::consts::OS)
  }

  /// Map a Rust `target_os` value onto the Node.js platform name.
  pub fn from_rust(os: &str) -> Option<Self> {
    match os {
      "linux" | "android" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      "openbsd" => Some(Self::OpenBsd),
      "solaris" | "illumos" => Some(Self::SunOs),
      "aix" => Some(Self::Aix),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "win32",
      Self::FreeBsd => "freebsd",
      Self::OpenBsd => "openbsd",
      Self::SunOs => "sunos",
      Self::Aix => "aix",
    }
  }

  pub fn is_windows(&self) -> bool {
    matches!(self, Self::Windows)
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
