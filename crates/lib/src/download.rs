//! Prebuilt artifact download.
//!
//! The compressed package is fetched over HTTP, gunzipped while it streams,
//! and returned as raw bytes. Transport errors, decompression errors and the
//! end of the gzip stream all race to settle one [`Completion`]; the first
//! one wins and later signals are dropped.

use std::fmt;
use std::io;
use std::time::Duration;

use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use crate::config::Settings;
use crate::identity::ArtifactId;
use crate::util::format_limit;

const READ_CHUNK: usize = 64 * 1024;

/// Download failures.
#[derive(Debug, Error)]
pub enum DownloadError {
  #[error("Failed to download {url}: code {code}")]
  Status { url: String, code: u16 },

  #[error("Failed to download {url}: {message}")]
  Transport { url: String, message: String },

  #[error("Failed to unzip {url}: {source}")]
  Decompress {
    url: String,
    #[source]
    source: io::Error,
  },

  #[error("Failed to download {url}: timed out after {}", format_limit(.limit))]
  TimedOut { url: String, limit: Duration },
}

/// Somewhere a prebuilt artifact can be fetched from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
  /// Fetch the artifact and return its decompressed bytes.
  async fn download(&self) -> Result<Vec<u8>, DownloadError>;
}

/// Fetches `{host}/{remote_path}/{package_file_name}` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
  client: reqwest::Client,
  url: String,
  timeout: Option<Duration>,
}

impl HttpDownloader {
  pub fn new(settings: &Settings, id: &ArtifactId) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: settings.download_url(&id.package_file_name()),
      timeout: settings.download_timeout,
    }
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  async fn fetch(&self) -> Result<Vec<u8>, DownloadError> {
    let response = self.client.get(&self.url).send().await.map_err(|e| DownloadError::Transport {
      url: self.url.clone(),
      message: e.to_string(),
    })?;

    let status = response.status();
    if status != StatusCode::OK {
      return Err(DownloadError::Status {
        url: self.url.clone(),
        code: status.as_u16(),
      });
    }

    decode_body(&self.url, response.bytes_stream()).await
  }
}

#[async_trait]
impl ArtifactSource for HttpDownloader {
  async fn download(&self) -> Result<Vec<u8>, DownloadError> {
    info!(url = %self.url, "downloading prebuilt artifact");

    let data = match self.timeout {
      Some(limit) => tokio::time::timeout(limit, self.fetch())
        .await
        .map_err(|_| DownloadError::TimedOut {
          url: self.url.clone(),
          limit,
        })??,
      None => self.fetch().await?,
    };

    info!(url = %self.url, size = data.len(), "download complete");
    Ok(data)
  }
}

/// Gunzip a response body into memory.
///
/// Once the gzip stream ends the rest of the body is drained; any transport
/// error seen while draining arrives after the outcome is settled and is
/// ignored.
pub async fn decode_body<S, E>(url: &str, body: S) -> Result<Vec<u8>, DownloadError>
where
  S: Stream<Item = Result<Bytes, E>> + Send,
  E: fmt::Display,
{
  let body = Box::pin(body.map_err(|err| io::Error::other(TransportFailure(err.to_string()))));
  let mut decoder = GzipDecoder::new(StreamReader::new(body));
  let (mut completion, outcome) = Completion::new();

  let mut buffer = Vec::new();
  let mut chunk = vec![0u8; READ_CHUNK];
  loop {
    match decoder.read(&mut chunk).await {
      Ok(0) => {
        completion.settle(Ok(std::mem::take(&mut buffer)));
        break;
      }
      Ok(n) => buffer.extend_from_slice(&chunk[..n]),
      Err(err) => {
        completion.settle(Err(classify(url, err)));
        break;
      }
    }
  }

  let mut rest = decoder.into_inner().into_inner();
  while let Some(item) = rest.next().await {
    if let Err(err) = item {
      if !completion.settle(Err(classify(url, err))) {
        debug!(url = %url, "ignoring transport error after download settled");
      }
      break;
    }
  }

  outcome.await.map_err(|_| DownloadError::Transport {
    url: url.to_string(),
    message: "download ended without a result".to_string(),
  })?
}

/// Marks I/O errors that originate from the response stream rather than
/// from the gzip decoder.
#[derive(Debug, Error)]
#[error("{0}")]
struct TransportFailure(String);

fn classify(url: &str, err: io::Error) -> DownloadError {
  match err.get_ref().and_then(|inner| inner.downcast_ref::<TransportFailure>()) {
    Some(TransportFailure(message)) => DownloadError::Transport {
      url: url.to_string(),
      message: message.clone(),
    },
    None => DownloadError::Decompress {
      url: url.to_string(),
      source: err,
    },
  }
}

/// One-shot completion guard: the first settled value is delivered, every
/// later one is dropped.
pub struct Completion<T> {
  sender: Option<oneshot::Sender<T>>,
}

impl<T> Completion<T> {
  pub fn new() -> (Self, oneshot::Receiver<T>) {
    let (sender, receiver) = oneshot::channel();
    (Self { sender: Some(sender) }, receiver)
  }

  /// Deliver `value` if nothing was delivered yet. Returns whether it won.
  pub fn settle(&mut self, value: T) -> bool {
    match self.sender.take() {
      Some(sender) => {
        // Receiver gone means nobody is waiting; the signal still counts as first.
        let _ = sender.send(value);
        true
      }
      None => false,
    }
  }

  pub fn is_settled(&self) -> bool {
    self.sender.is_none()
  }
}
