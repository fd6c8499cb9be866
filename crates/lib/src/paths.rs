//! Directory creation beneath the package root.
//!
//! Directories are created one segment at a time with an explicit
//! read+write check at each level. `create_dir_all` is not used.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

/// Filesystem failures while placing the artifact.
#[derive(Debug, Error)]
pub enum FsError {
  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to move {from} to {to}: {source}")]
  Rename {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Ensure `target` exists, walking from `root`.
///
/// `target` is first made relative to `root`. A target outside `root`
/// produces `..` segments which are walked like any other segment. A
/// segment that already exists, including one created concurrently by
/// another process, is not an error.
pub async fn ensure_path(root: &Path, target: &Path) -> Result<(), FsError> {
  let relative = relative_to(root, target);
  let mut current = root.to_path_buf();

  for segment in relative.components() {
    current.push(segment);

    if is_accessible(&current) {
      trace!(path = ?current, "path segment accessible");
      continue;
    }

    debug!(path = ?current, "creating directory");
    match tokio::fs::create_dir(&current).await {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
        trace!(path = ?current, "directory appeared concurrently");
      }
      Err(source) => return Err(FsError::CreateDir { path: current, source }),
    }
  }

  Ok(())
}

/// Express `target` relative to `root`, using `..` for parts outside it.
pub fn relative_to(root: &Path, target: &Path) -> PathBuf {
  let root: Vec<Component<'_>> = normalized(root);
  let target: Vec<Component<'_>> = normalized(target);

  let common = root.iter().zip(&target).take_while(|(a, b)| a == b).count();

  let mut relative = PathBuf::new();
  for _ in common..root.len() {
    relative.push("..");
  }
  for component in &target[common..] {
    relative.push(component.as_os_str());
  }
  relative
}

fn normalized(path: &Path) -> Vec<Component<'_>> {
  path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

#[cfg(unix)]
fn is_accessible(path: &Path) -> bool {
  use rustix::fs::{Access, access};

  access(path, Access::READ_OK | Access::WRITE_OK).is_ok()
}

#[cfg(not(unix))]
fn is_accessible(path: &Path) -> bool {
  std::fs::metadata(path)
    .map(|meta| !meta.permissions().readonly())
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn relative_inside_root() {
    assert_eq!(
      relative_to(Path::new("/pkg"), Path::new("/pkg/build/Release")),
      PathBuf::from("build/Release")
    );
  }

  #[test]
  fn relative_of_root_is_empty() {
    assert_eq!(relative_to(Path::new("/pkg"), Path::new("/pkg")), PathBuf::new());
  }

  #[test]
  fn relative_outside_root_uses_parent_segments() {
    assert_eq!(
      relative_to(Path::new("/pkg/a"), Path::new("/pkg/b/c")),
      PathBuf::from("../b/c")
    );
  }

  #[tokio::test]
  async fn creates_nested_segments() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("build").join("Release");

    ensure_path(temp.path(), &target).await.unwrap();

    assert!(target.is_dir());
  }

  #[tokio::test]
  async fn existing_path_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("build");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("keep"), b"x").unwrap();

    ensure_path(temp.path(), &target).await.unwrap();

    assert_eq!(std::fs::read(target.join("keep")).unwrap(), b"x");
  }

  #[tokio::test]
  async fn concurrent_calls_both_succeed() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("a").join("b").join("c");

    let (first, second) = tokio::join!(
      ensure_path(temp.path(), &target),
      ensure_path(temp.path(), &target)
    );

    first.unwrap();
    second.unwrap();
    assert!(target.is_dir());
    let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
  }

  #[tokio::test]
  async fn path_outside_root_is_walked_through_parent() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("pkg");
    std::fs::create_dir(&root).unwrap();
    let target = temp.path().join("sibling").join("out");

    ensure_path(&root, &target).await.unwrap();

    assert!(target.is_dir());
  }

  #[tokio::test]
  async fn blocked_segment_aborts_remaining_segments() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("build"), b"not a directory").unwrap();
    let target = temp.path().join("build").join("Release");

    let err = ensure_path(temp.path(), &target).await.unwrap_err();

    assert!(matches!(err, FsError::CreateDir { .. }));
    assert!(!target.exists());
  }
}
