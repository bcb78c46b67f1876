//! # Job Model Module
//!
//! Questo modulo definisce il job di elaborazione e la sua macchina a stati.
//!
//! ## Responsabilità:
//! - `JobId`: identificatore univoco (UUID v4) di un job
//! - `SourceHandle`: riferimento opaco alla sorgente, risolto dal delivery adapter
//! - `Stage`: i sei stage lineari della pipeline
//! - `JobState`: stati del ciclo di vita, con transizioni strettamente lineari
//!
//! ## Macchina a stati:
//! ```text
//! Created → Downloaded → PreviewReady → UpscaledReady → Published → Monetized → Delivered
//!    └──────────┴────────────┴──────────────┴─────────────┴───────────┴──→ Failed | Cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in log lines and workspace names
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque locator of the submitted media. Only the delivery adapter knows how
/// to turn it into bytes (a chat file id, a local path, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHandle(String);

impl SourceHandle {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Preview,
    Upscale,
    Publish,
    Monetize,
    Deliver,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 6] = [
        Stage::Download,
        Stage::Preview,
        Stage::Upscale,
        Stage::Publish,
        Stage::Monetize,
        Stage::Deliver,
    ];

    /// State the job must be in before this stage runs
    pub fn entry_state(&self) -> JobState {
        match self {
            Stage::Download => JobState::Created,
            Stage::Preview => JobState::Downloaded,
            Stage::Upscale => JobState::PreviewReady,
            Stage::Publish => JobState::UpscaledReady,
            Stage::Monetize => JobState::Published,
            Stage::Deliver => JobState::Monetized,
        }
    }

    /// State reached once this stage completes
    pub fn exit_state(&self) -> JobState {
        match self {
            Stage::Download => JobState::Downloaded,
            Stage::Preview => JobState::PreviewReady,
            Stage::Upscale => JobState::UpscaledReady,
            Stage::Publish => JobState::Published,
            Stage::Monetize => JobState::Monetized,
            Stage::Deliver => JobState::Delivered,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Preview => "preview",
            Stage::Upscale => "upscale",
            Stage::Publish => "publish",
            Stage::Monetize => "monetize",
            Stage::Deliver => "deliver",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Downloaded,
    PreviewReady,
    UpscaledReady,
    Published,
    Monetized,
    Delivered,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Delivered | JobState::Failed | JobState::Cancelled)
    }
}

/// Rejected state change
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Illegal job transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: JobState,
    pub to: JobState,
}

/// One processing request for one submitted video
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source: SourceHandle,
    state: JobState,
    history: Vec<JobState>,
}

impl Job {
    pub fn new(source: SourceHandle) -> Self {
        Self {
            id: JobId::new(),
            source,
            state: JobState::Created,
            history: vec![JobState::Created],
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state the job went through, in order
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// Mark `stage` as completed. The job must currently sit in the stage's entry state.
    pub fn complete(&mut self, stage: Stage) -> Result<JobState, IllegalTransition> {
        let to = stage.exit_state();
        if self.state != stage.entry_state() {
            return Err(IllegalTransition { from: self.state, to });
        }
        self.set(to);
        Ok(to)
    }

    /// Move to `Failed` (or `Cancelled`). Only allowed from a non-terminal state.
    pub fn abort(&mut self, cancelled: bool) -> Result<JobState, IllegalTransition> {
        let to = if cancelled { JobState::Cancelled } else { JobState::Failed };
        if self.state.is_terminal() {
            return Err(IllegalTransition { from: self.state, to });
        }
        self.set(to);
        Ok(to)
    }

    fn set(&mut self, state: JobState) {
        self.state = state;
        self.history.push(state);
    }
}
