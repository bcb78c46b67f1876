//! # Publisher Module
//!
//! Questo modulo pubblica l'artifact 4K su un file host remoto (Gofile).
//!
//! ## Responsabilità:
//! - Upload multipart in streaming (`file`, `token`, `folderId`), senza caricare
//!   il file in memoria
//! - Client HTTP non bloccante (`reqwest`): l'upload non ferma mai il runtime
//! - Timeout fisso sull'intera chiamata (default 60s)
//! - Interpretazione della risposta JSON:
//!   `{"status": "ok", "data": {"downloadPage": "..."}}`
//!
//! ## Errori (`PublishError`):
//! - Risposta HTTP non-2xx
//! - `status` diverso da `"ok"`
//! - Connessione fallita, timeout, JSON non valido, URL mancante
//!
//! Nessun retry e nessun rollback remoto: l'upload è un tentativo singolo.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use crate::artifact::{MediaArtifact, PublishedLink};
use crate::config::Config;
use crate::error::PublishError;
use crate::utils::format_size;

/// Sentinel status of a successful upload
const STATUS_OK: &str = "ok";

/// Uploads a finished artifact and returns its public URL
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn upload(&self, artifact: &MediaArtifact) -> Result<PublishedLink, PublishError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    status: String,
    #[serde(default)]
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    #[serde(rename = "downloadPage")]
    download_page: Option<String>,
}

/// Gofile upload client
#[derive(Debug, Clone)]
pub struct GofilePublisher {
    client: Client,
    endpoint: String,
    token: String,
    folder_id: String,
    timeout: Duration,
}

impl GofilePublisher {
    pub fn new(config: &Config) -> Result<Self, PublishError> {
        let timeout = config.upload_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PublishError::Request)?;

        Ok(Self {
            client,
            endpoint: config.upload_endpoint.clone(),
            token: config.upload_token.clone(),
            folder_id: config.upload_folder_id.clone(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> PublishError {
        if err.is_timeout() {
            PublishError::Timeout(self.timeout)
        } else {
            PublishError::Request(err)
        }
    }

    async fn file_part(&self, artifact: &MediaArtifact) -> Result<Part, PublishError> {
        let path = artifact.path();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| PublishError::Artifact {
                path: path.to_path_buf(),
                source,
            })?;
        let size = file
            .metadata()
            .await
            .map_err(|source| PublishError::Artifact {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        debug!("Streaming {} ({})", path.display(), format_size(size));

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.role().file_name().to_string());

        Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), size)
            .file_name(file_name)
            .mime_str("video/mp4")
            .map_err(PublishError::Request)
    }
}

#[async_trait]
impl Publisher for GofilePublisher {
    async fn upload(&self, artifact: &MediaArtifact) -> Result<PublishedLink, PublishError> {
        let form = Form::new()
            .part("file", self.file_part(artifact).await?)
            .text("token", self.token.clone())
            .text("folderId", self.folder_id.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            error!("File host answered HTTP {}", status);
            return Err(PublishError::Http(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;

        if parsed.status != STATUS_OK {
            error!("File host upload failed: {}", body);
            return Err(PublishError::Rejected(parsed.status));
        }

        let url = parsed
            .data
            .and_then(|d| d.download_page)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| PublishError::InvalidResponse("missing data.downloadPage".to_string()))?;

        info!("☁️ Published {} -> {}", artifact.path().display(), url);
        Ok(PublishedLink::new(url))
    }
}
