//! Publishing a built artifact to the object store.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use async_compression::tokio::bufread::GzipEncoder;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info};

use crate::config::Settings;
use crate::identity::ArtifactId;

#[derive(Debug, Error)]
pub enum UploadError {
  #[error("Failed to upload file: cannot read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Failed to upload file: {message}")]
  Store { message: String },
}

/// Object body, read incrementally by the store.
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

/// Destination for published artifacts. Returns the number of bytes stored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
  async fn put_object(&self, bucket: &str, key: &str, body: Body) -> Result<u64, UploadError>;
}

fn store_error(context: impl std::fmt::Display, err: impl std::fmt::Display) -> UploadError {
  UploadError::Store {
    message: format!("{}: {}", context, err),
  }
}

/// S3 object store. Credentials come from the ambient AWS environment
/// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, profiles, ...).
pub struct S3Store {
  client: Client,
}

impl std::fmt::Debug for S3Store {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("S3Store").finish_non_exhaustive()
  }
}

impl S3Store {
  pub async fn from_env() -> Self {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
    Self {
      client: Client::new(&config),
    }
  }
}

#[async_trait]
impl ObjectStore for S3Store {
  async fn put_object(&self, bucket: &str, key: &str, mut body: Body) -> Result<u64, UploadError> {
    // S3 needs the content length up front, and the compressed size is only
    // known once the stream ends.
    let mut data = Vec::new();
    body.read_to_end(&mut data).await.map_err(|err| store_error(key, err))?;
    let size = data.len() as u64;

    self
      .client
      .put_object()
      .bucket(bucket)
      .key(key)
      .content_type("application/gzip")
      .body(ByteStream::from(data))
      .send()
      .await
      .map_err(|err| UploadError::Store {
        message: DisplayErrorContext(&err).to_string(),
      })?;
    Ok(size)
  }
}

/// Filesystem-backed store writing `<base>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
  base: PathBuf,
}

impl LocalStore {
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self { base: base.into() }
  }

  pub fn path_for(&self, bucket: &str, key: &str) -> PathBuf {
    self.base.join(bucket).join(key)
  }
}

#[async_trait]
impl ObjectStore for LocalStore {
  async fn put_object(&self, bucket: &str, key: &str, mut body: Body) -> Result<u64, UploadError> {
    let path = self.path_for(bucket, key);
    let store_err = |err: io::Error| store_error(path.display(), err);

    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(store_err)?;
    }
    let mut file = tokio::fs::File::create(&path).await.map_err(store_err)?;
    let size = tokio::io::copy(&mut body, &mut file).await.map_err(store_err)?;
    file.sync_all().await.map_err(store_err)?;

    debug!(path = ?path, size, "object written");
    Ok(size)
  }
}

/// Compresses the canonical binary and publishes it.
pub struct Uploader<O> {
  store: O,
  binary_path: PathBuf,
  bucket: String,
  key: String,
}

impl<O: ObjectStore> Uploader<O> {
  pub fn new(store: O, settings: &Settings, id: &ArtifactId) -> Self {
    Self {
      store,
      binary_path: settings.binary_path(&id.binary_file_name()),
      bucket: settings.bucket.clone(),
      key: settings.upload_key(&id.package_file_name()),
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Stream the binary through a gzip encoder into the store.
  pub async fn upload(&self) -> Result<u64, UploadError> {
    let file = File::open(&self.binary_path).await.map_err(|source| UploadError::Read {
      path: self.binary_path.clone(),
      source,
    })?;
    let body: Body = Box::pin(GzipEncoder::new(BufReader::new(file)));

    info!(bucket = %self.bucket, key = %self.key, "uploading artifact");
    let size = self.store.put_object(&self.bucket, &self.key, body).await?;
    info!(key = %self.key, size, "upload complete");
    Ok(size)
  }
}
