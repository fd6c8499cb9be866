//! Loading the installed native module.
//!
//! The canonical binary path is resolved from the artifact identifier and
//! handed to a [`LoadLibrary`] implementation. The loaded module is cached
//! for the life of the loader, so later loads return the same handle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::config::Settings;
use crate::identity::ArtifactId;

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("native module not found at {0}")]
  NotFound(PathBuf),

  #[error("failed to load native module {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: libloading::Error,
  },
}

/// Opens a native module from disk.
pub trait LoadLibrary: Send + Sync {
  type Module: Send + Sync;

  fn open(&self, path: &Path) -> Result<Self::Module, LoadError>;
}

/// Result of a load: either the module already held by the loader or a
/// freshly opened one.
#[derive(Debug)]
pub enum Loaded<M> {
  Cached(Arc<M>),
  Fresh(Arc<M>),
}

impl<M> Loaded<M> {
  pub fn module(&self) -> &Arc<M> {
    match self {
      Loaded::Cached(module) | Loaded::Fresh(module) => module,
    }
  }

  pub fn is_cached(&self) -> bool {
    matches!(self, Loaded::Cached(_))
  }
}

/// Loads the canonical binary once and caches the handle.
pub struct ArtifactLoader<L: LoadLibrary> {
  library: L,
  path: PathBuf,
  cache: Mutex<Option<Arc<L::Module>>>,
}

impl<L: LoadLibrary> ArtifactLoader<L> {
  pub fn new(library: L, settings: &Settings, id: &ArtifactId) -> Self {
    Self {
      library,
      path: settings.binary_path(&id.binary_file_name()),
      cache: Mutex::new(None),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn load(&self) -> Result<Loaded<L::Module>, LoadError> {
    let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(module) = cache.as_ref() {
      return Ok(Loaded::Cached(Arc::clone(module)));
    }

    if !self.path.is_file() {
      return Err(LoadError::NotFound(self.path.clone()));
    }

    debug!(path = ?self.path, "loading native module");
    let module = Arc::new(self.library.open(&self.path)?);
    *cache = Some(Arc::clone(&module));
    Ok(Loaded::Fresh(module))
  }
}

/// Opens the binary as a platform dynamic library (`dlopen`/`LoadLibrary`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryLoader;

impl LoadLibrary for LibraryLoader {
  type Module = libloading::Library;

  fn open(&self, path: &Path) -> Result<libloading::Library, LoadError> {
    // SAFETY: the binary is the artifact this package built or installed;
    // running its initializers is what loading it means.
    unsafe { libloading::Library::new(path) }.map_err(|source| LoadError::Open {
      path: path.to_path_buf(),
      source,
    })
  }
}
