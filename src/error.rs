//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore della pipeline.
//!
//! ## Responsabilità:
//! - Un enum di errore per ogni stage (`SourceError`, `TranscodeError`,
//!   `PublishError`, `MonetizeError`)
//! - `DeliveryError` quando il delivery adapter non riesce a consegnare il risultato
//! - `TeardownError` per la pulizia del workspace (solo loggato, mai propagato)
//! - `JobError` come errore terminale di un job, con lo stage che ha fallito
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Politica di propagazione:
//! - Gli errori degli stage sono terminali per il job
//! - Vengono catturati una sola volta dall'orchestratore e loggati con contesto
//! - L'utente riceve sempre e solo un messaggio generico
//!
//! ## Esempio:
//! ```rust,ignore
//! if !status.success() {
//!     return Err(TranscodeError::failed(Stage::Preview, status.code(), stderr));
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::job::Stage;

/// The source bytes could not be obtained.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("Source not available: {0}")]
    Unavailable(String),

    #[error("Failed to write source into workspace: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source is empty")]
    Empty,
}

/// The encoding tool could not produce an artifact.
#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("{tool} not found (looked in TOOLS_DIR and PATH)")]
    ToolMissing { tool: String },

    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} encode exited with status {code:?}: {stderr}")]
    Failed {
        stage: Stage,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{stage} encode timed out after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    #[error("Encoder reported success but produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Transcode permit pool closed")]
    PoolClosed,
}

impl TranscodeError {
    pub fn failed(stage: Stage, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            code,
            stderr: stderr.into(),
        }
    }
}

/// Upload to the file host was rejected or unreachable.
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("Cannot read artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("File host answered HTTP {0}")]
    Http(u16),

    #[error("File host rejected upload with status {0:?}")]
    Rejected(String),

    #[error("Unreadable file host response: {0}")]
    InvalidResponse(String),
}

/// Link shortening was rejected or unreachable.
#[derive(thiserror::Error, Debug)]
pub enum MonetizeError {
    #[error("Shortener request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Shortener answered HTTP {0}")]
    Http(u16),

    #[error("Shortener rejected link with status {status:?}: {message}")]
    Rejected { status: String, message: String },

    #[error("Unreadable shortener response: {0}")]
    InvalidResponse(String),
}

/// The delivery adapter could not hand the result to the requester.
#[derive(thiserror::Error, Debug)]
#[error("Delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Workspace cleanup failure. Logged, never returned to callers of the pipeline.
#[derive(thiserror::Error, Debug)]
#[error("Failed to remove workspace {path}: {source}")]
pub struct TeardownError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Terminal failure of a job.
#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("Workspace allocation failed: {0}")]
    Workspace(#[source] std::io::Error),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Monetize(#[from] MonetizeError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Job cancelled")]
    Cancelled,
}

impl JobError {
    /// Error kind name used in operational logs
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Workspace(_) => "WorkspaceError",
            JobError::Source(_) => "SourceError",
            JobError::Transcode(_) => "TranscodeError",
            JobError::Publish(_) => "PublishError",
            JobError::Monetize(_) => "MonetizeError",
            JobError::Delivery(_) => "DeliveryError",
            JobError::Cancelled => "Cancelled",
        }
    }
}
