//! Archive download of the enabled layers.
//!
//! The backend packages the requested rasters into one zip:
//! `GET <download_url>/<KEY1,KEY2,...>`. The body is streamed to
//! `EHCPA_Data.zip.partial` with percentage progress when the server sends
//! a Content-Length, and renamed to `EHCPA_Data.zip` only once complete.
//! A previous archive survives a failed download untouched.
//!
//! There is no overall deadline: a large archive on a slow link may take
//! as long as it needs, but the transfer fails once no bytes arrive for
//! the idle timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ehcpa_common::LayerKey;
use futures::StreamExt;
use reqwest::{header, Client};
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// File name the archive is saved under.
pub const ARCHIVE_NAME: &str = "EHCPA_Data.zip";

const NETWORK_ERROR_TEXT: &str = "Error de conexión con el servidor, por lo que no es posible \
realizar la descarga en este momento. Intente nuevamente más tarde.";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Debe seleccionar al menos una capa para descargar.")]
    NoLayersSelected,

    /// The server answered with an error and a message for the user.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// No answer: refused connection, DNS failure, timeout.
    #[error("Network Error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            DownloadError::Network(err.to_string())
        } else {
            DownloadError::Other(err.to_string())
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::Other(err.to_string())
    }
}

/// Blocking dialog shown for a failed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAlert {
    pub title: &'static str,
    pub text: String,
}

impl DownloadError {
    pub fn alert(&self) -> DownloadAlert {
        match self {
            DownloadError::NoLayersSelected => DownloadAlert {
                title: "Atención",
                text: self.to_string(),
            },
            DownloadError::Server { message, .. } => DownloadAlert {
                title: "Oops!",
                text: message.clone(),
            },
            DownloadError::Network(_) => DownloadAlert {
                title: "Network Error",
                text: NETWORK_ERROR_TEXT.to_string(),
            },
            DownloadError::Other(msg) => DownloadAlert {
                title: "Error Desconocido",
                text: msg.clone(),
            },
        }
    }
}

/// Progress indicator state of the download button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStatus {
    pub downloading: bool,
    /// Whole percent, when the total size is known
    pub progress: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct DownloadTrigger {
    client: Client,
    base_url: String,
    idle_timeout: Duration,
    status: DownloadStatus,
}

impl DownloadTrigger {
    /// `idle_timeout` bounds connecting, waiting for the response headers
    /// and each gap between body chunks.
    pub fn new(base_url: impl Into<String>, idle_timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(idle_timeout)
            .build()
            .map_err(|e| DownloadError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            idle_timeout,
            status: DownloadStatus::default(),
        })
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    /// Download URL for a set of layer keys.
    pub fn request_url(&self, keys: &[LayerKey]) -> String {
        let joined: Vec<&str> = keys.iter().map(LayerKey::as_str).collect();
        format!("{}/{}", self.base_url.trim_end_matches('/'), joined.join(","))
    }

    pub async fn download(
        &mut self,
        keys: &[LayerKey],
        output_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        self.download_with_progress(keys, output_dir, |_| {}).await
    }

    /// Fetch the archive for `keys` into `output_dir`, reporting whole
    /// percentages to `on_progress` as they change.
    #[instrument(skip(self, keys, output_dir, on_progress), fields(layers = keys.len()))]
    pub async fn download_with_progress<F>(
        &mut self,
        keys: &[LayerKey],
        output_dir: &Path,
        on_progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: FnMut(u8),
    {
        if keys.is_empty() {
            return Err(DownloadError::NoLayersSelected);
        }

        self.status = DownloadStatus {
            downloading: true,
            progress: Some(0),
        };
        let result = self.fetch(keys, output_dir, on_progress).await;
        self.status = DownloadStatus::default();

        match &result {
            Ok(path) => info!(path = %path.display(), "Download complete"),
            Err(e) => warn!(error = %e, "Download failed"),
        }
        result
    }

    async fn fetch<F>(
        &mut self,
        keys: &[LayerKey],
        output_dir: &Path,
        on_progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: FnMut(u8),
    {
        let url = self.request_url(keys);
        debug!(url = %url, "Requesting archive");

        let response = tokio::time::timeout(self.idle_timeout, self.client.get(&url).send())
            .await
            .map_err(|_| stalled(self.idle_timeout))??;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(DownloadError::Server {
                status: status.as_u16(),
                message,
            });
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(ARCHIVE_NAME);
        let temp_path = output_dir.join(format!("{}.partial", ARCHIVE_NAME));

        match self.write_body(response, &temp_path, on_progress).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
                    tokio::fs::remove_file(&temp_path).await.ok();
                    return Err(e.into());
                }
                Ok(path)
            }
            Err(e) => {
                tokio::fs::remove_file(&temp_path).await.ok();
                Err(e)
            }
        }
    }

    /// Stream the body into `temp_path`. A body shorter than its
    /// Content-Length is an error.
    async fn write_body<F>(
        &mut self,
        response: reqwest::Response,
        temp_path: &Path,
        mut on_progress: F,
    ) -> Result<(), DownloadError>
    where
        F: FnMut(u8),
    {
        let total: Option<u64> = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0);

        let mut file = File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut received = 0u64;
        let mut last_percent = None;

        loop {
            let next = tokio::time::timeout(self.idle_timeout, stream.next())
                .await
                .map_err(|_| stalled(self.idle_timeout))?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;

            if let Some(total) = total {
                let percent = ((received as f64 / total as f64) * 100.0).round().min(100.0) as u8;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    self.status.progress = Some(percent);
                    on_progress(percent);
                }
            } else {
                self.status.progress = None;
            }
        }

        file.flush().await?;
        if let Some(total) = total {
            if received != total {
                return Err(DownloadError::Other(format!(
                    "Descarga incompleta: se recibieron {} de {} bytes",
                    received, total
                )));
            }
        }
        debug!(bytes = received, total = ?total, "Archive written");
        Ok(())
    }
}

fn stalled(idle: Duration) -> DownloadError {
    DownloadError::Network(format!("no data received for {}s", idle.as_secs_f64()))
}
