//! # Job Workspace Module
//!
//! Questo modulo gestisce lo spazio di lavoro temporaneo di ogni job.
//!
//! ## Responsabilità:
//! - Crea una directory isolata per job (`upscale-job-<uuid>`) prima di
//!   qualunque scrittura di artifact
//! - Fornisce i path fissi degli artifact (`input.mp4`, `preview.mp4`, `upscaled.mp4`)
//! - Garantisce la rimozione ricorsiva esattamente una volta: `teardown()`
//!   esplicito a fine job, `Drop` come rete di sicurezza (panic, cancellazione)
//! - Gli errori di rimozione vengono solo loggati (`TeardownError`)
//!
//! ## Esempio:
//! ```rust,ignore
//! let workspace = Workspace::create(&config.workspace_root(), &job.id)?;
//! let source = workspace.artifact(ArtifactRole::Source);
//! // ... stage ...
//! workspace.teardown();
//! ```

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error};

use crate::artifact::{ArtifactRole, MediaArtifact};
use crate::error::TeardownError;
use crate::job::JobId;

/// Scratch directory owned by exactly one job
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    job_id: JobId,
}

impl Workspace {
    /// Allocate a fresh workspace under `root`
    pub fn create(root: &Path, job_id: &JobId) -> io::Result<Self> {
        // the uuid is already unique, no random suffix
        let dir = tempfile::Builder::new()
            .prefix(&format!("upscale-job-{}", job_id))
            .rand_bytes(0)
            .tempdir_in(root)?;
        debug!(job_id = %job_id, "Allocated workspace {}", dir.path().display());
        Ok(Self {
            dir,
            job_id: *job_id,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The artifact slot for `role` inside this workspace (the file may not exist yet)
    pub fn artifact(&self, role: ArtifactRole) -> MediaArtifact {
        MediaArtifact::new(role, self.artifact_path(role))
    }

    pub fn artifact_path(&self, role: ArtifactRole) -> PathBuf {
        self.dir.path().join(role.file_name())
    }

    /// Remove the workspace and everything in it
    pub fn close(self) -> Result<(), TeardownError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| TeardownError { path, source })
    }

    /// Best-effort removal: never fails, logs what it could not delete
    pub fn teardown(self) {
        let job_id = self.job_id;
        match self.close() {
            Ok(()) => debug!(job_id = %job_id, "Workspace removed"),
            Err(e) => error!(job_id = %job_id, error = %e, "TeardownError"),
        }
    }
}
