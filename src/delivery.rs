//! # Delivery Adapter Module
//!
//! Confine tra la pipeline e il front-end che ha ricevuto il video.
//!
//! ## Responsabilità:
//! - `DeliveryAdapter`: trait che il front-end implementa (chat bot, CLI, ...)
//!   - `open_source`: risolve il `SourceHandle` in uno stream di byte
//!   - `notify_progress` / `clear_progress`: messaggio di stato per l'utente
//!   - `deliver_result`: preview + didascalia + bottone con link monetizzato
//!   - `notify_failure`: avviso generico di errore
//! - Testi mostrati all'utente (didascalia, bottone, errore)
//! - `LocalDelivery`: implementazione su filesystem usata dalla CLI
//!
//! ## Contratto:
//! `deliver_result` riceve il path della preview dentro il workspace del job:
//! l'adapter deve consumarla (inviarla o copiarla) prima di ritornare, perché
//! il workspace viene rimosso subito dopo.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncRead;
use tracing::{info, warn};

use crate::error::{DeliveryError, SourceError};
use crate::job::{Job, JobId, SourceHandle};
use crate::json_output::JsonMessage;
use crate::progress::{JobSpinner, ProgressManager};

pub const PROCESSING_TEXT: &str = "⏳ Processing your video...";
pub const PREVIEW_CAPTION: &str =
    "🎞️ Here is your 5s 360p preview. Click below to download the Full 4K Video.";
pub const DOWNLOAD_BUTTON_LABEL: &str = "⬇️ Download Full 4K Video";
pub const FAILURE_TEXT: &str = "❌ Sorry, there was an error processing your video.";

/// Byte stream of the submitted media
pub type SourceStream = Box<dyn AsyncRead + Send + Unpin>;

/// Link button rendered under the preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub label: String,
    pub url: String,
}

impl ActionButton {
    pub fn download(url: impl Into<String>) -> Self {
        Self {
            label: DOWNLOAD_BUTTON_LABEL.to_string(),
            url: url.into(),
        }
    }
}

/// Front-end side of the pipeline
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Resolve the source handle into readable bytes
    async fn open_source(&self, source: &SourceHandle) -> Result<SourceStream, SourceError>;

    /// Show a status message to the requester
    async fn notify_progress(&self, job: &JobId, text: &str);

    /// Remove the status message once the result is out
    async fn clear_progress(&self, job: &JobId);

    /// Hand the preview and the monetized link to the requester
    async fn deliver_result(
        &self,
        job: &JobId,
        preview: &Path,
        caption: &str,
        action: &ActionButton,
    ) -> Result<(), DeliveryError>;

    /// Tell the requester the job failed
    async fn notify_failure(&self, job: &JobId, text: &str);
}

struct LocalJob {
    label: String,
    spinner: Option<JobSpinner>,
}

/// Delivery to the local filesystem: sources are local paths, previews are
/// copied into an output directory, links go to the spinner or to JSON lines.
pub struct LocalDelivery {
    output_dir: PathBuf,
    json_output: bool,
    progress: ProgressManager,
    jobs: Mutex<HashMap<JobId, LocalJob>>,
}

impl LocalDelivery {
    pub fn new(output_dir: impl Into<PathBuf>, json_output: bool) -> Self {
        let progress = if json_output {
            ProgressManager::hidden()
        } else {
            ProgressManager::new()
        };
        Self {
            output_dir: output_dir.into(),
            json_output,
            progress,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Track a job before it runs, so its output can be named after its source
    pub fn register(&self, job: &Job) {
        let label = Path::new(job.source.as_str())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.id.short());

        let spinner = if self.json_output {
            JsonMessage::Start {
                job_id: job.id,
                source: job.source.to_string(),
            }
            .emit();
            None
        } else {
            Some(self.progress.job_spinner(&label))
        };

        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(job.id, LocalJob { label, spinner });
        }
    }

    /// Where the preview of `job` lands: `<source stem>-<job id>-preview.mp4`,
    /// so sources sharing a stem never overwrite each other
    pub fn preview_destination(&self, job: &JobId) -> PathBuf {
        let label = self
            .jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(job).map(|j| j.label.clone()));
        let file_name = match label {
            Some(label) => format!("{}-{}-preview.mp4", label, job.short()),
            None => format!("{}-preview.mp4", job.short()),
        };
        self.output_dir.join(file_name)
    }

    fn spinner(&self, job: &JobId) -> Option<JobSpinner> {
        self.jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(job).and_then(|j| j.spinner.clone()))
    }

    /// Stop tracking a job whose outcome has been reported
    fn forget(&self, job: &JobId) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.remove(job);
        }
    }
}

#[async_trait]
impl DeliveryAdapter for LocalDelivery {
    async fn open_source(&self, source: &SourceHandle) -> Result<SourceStream, SourceError> {
        let file = tokio::fs::File::open(source.as_str())
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", source, e)))?;
        Ok(Box::new(file))
    }

    async fn notify_progress(&self, job: &JobId, text: &str) {
        if self.json_output {
            JsonMessage::Progress {
                job_id: *job,
                text: text.to_string(),
            }
            .emit();
        } else if let Some(spinner) = self.spinner(job) {
            spinner.update(text);
        }
    }

    async fn clear_progress(&self, _job: &JobId) {
        // the spinner is finished by deliver_result / notify_failure
    }

    async fn deliver_result(
        &self,
        job: &JobId,
        preview: &Path,
        caption: &str,
        action: &ActionButton,
    ) -> Result<(), DeliveryError> {
        let destination = self.preview_destination(job);
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| DeliveryError(format!("{}: {}", self.output_dir.display(), e)))?;
        tokio::fs::copy(preview, &destination)
            .await
            .map_err(|e| DeliveryError(format!("{}: {}", destination.display(), e)))?;

        info!(job_id = %job, "Preview saved to {}", destination.display());

        if self.json_output {
            JsonMessage::Delivered {
                job_id: *job,
                preview: destination,
                caption: caption.to_string(),
                button_label: action.label.clone(),
                url: action.url.clone(),
            }
            .emit();
        } else if let Some(spinner) = self.spinner(job) {
            spinner.succeed(&format!("{} → {}", destination.display(), action.url));
        }
        self.forget(job);
        Ok(())
    }

    async fn notify_failure(&self, job: &JobId, text: &str) {
        if self.json_output {
            JsonMessage::Failed {
                job_id: *job,
                text: text.to_string(),
            }
            .emit();
        } else if let Some(spinner) = self.spinner(job) {
            spinner.fail(text);
        } else {
            warn!(job_id = %job, "{}", text);
        }
        self.forget(job);
    }
}
