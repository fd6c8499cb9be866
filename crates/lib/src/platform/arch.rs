use std::fmt;

/// CPU architectures in the naming scheme used by Node.js (`process.arch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X64,
  Ia32,
  Arm64,
  Arm,
  Ppc64,
  S390x,
  Riscv64,
  Loong64,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    Self::from_rust(std::env::consts::ARCH)
  }

  /// Map a Rust `target_arch` value onto the Node.js architecture name.
  pub fn from_rust(arch: &str) -> Option<Self> {
    match arch {
      "x86_64" => Some(Self::X64),
      "x86" => Some(Self::Ia32),
      "aarch64" => Some(Self::Arm64),
      "arm" => Some(Self::Arm),
      "powerpc64" => Some(Self::Ppc64),
      "s390x" => Some(Self::S390x),
      "riscv64" => Some(Self::Riscv64),
      "loongarch64" => Some(Self::Loong64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X64 => "x64",
      Self::Ia32 => "ia32",
      Self::Arm64 => "arm64",
      Self::Arm => "arm",
      Self::Ppc64 => "ppc64",
      Self::S390x => "s390x",
      Self::Riscv64 => "riscv64",
      Self::Loong64 => "loong64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
