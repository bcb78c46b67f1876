//! # Artifact Types Module
//!
//! Tipi per i file prodotti dagli stage e per i link restituiti dai servizi esterni.
//!
//! - `MediaArtifact`: file nel workspace del job con il suo ruolo
//! - `PublishedLink`: URL pubblico restituito dal file host
//! - `MonetizedLink`: URL monetizzato, derivato da esattamente un `PublishedLink`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Role of an artifact inside a job workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    Source,
    Preview,
    Upscaled,
}

impl ArtifactRole {
    /// Fixed file name of the artifact inside the workspace
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactRole::Source => "input.mp4",
            ArtifactRole::Preview => "preview.mp4",
            ArtifactRole::Upscaled => "upscaled.mp4",
        }
    }
}

/// A media file owned by one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    role: ArtifactRole,
    path: PathBuf,
}

impl MediaArtifact {
    pub fn new(role: ArtifactRole, path: PathBuf) -> Self {
        Self { role, path }
    }

    pub fn role(&self) -> ArtifactRole {
        self.role
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Public access URL of an uploaded artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedLink(String);

impl PublishedLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublishedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monetized redirect wrapping exactly one published link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonetizedLink {
    url: String,
    target: PublishedLink,
}

impl MonetizedLink {
    pub fn new(url: impl Into<String>, target: PublishedLink) -> Self {
        Self {
            url: url.into(),
            target,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The published link this redirect points to
    pub fn target(&self) -> &PublishedLink {
        &self.target
    }
}

impl fmt::Display for MonetizedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
