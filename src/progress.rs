//! # Progress Display Module
//!
//! Questo modulo gestisce il feedback visivo dei job in esecuzione da CLI.
//!
//! ## Responsabilità:
//! - Uno spinner `indicatif` per ogni job, tutti sotto un unico `MultiProgress`
//! - Aggiornamento del messaggio di stato del job
//! - Chiusura dello spinner con esito (✅ / ❌)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:42] clip.mp4: ⏳ Processing your video...
//! ✅ [00:01:10] clip.mp4: https://shrinkearn.com/Xy9
//! ```

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Owns the spinners of all jobs
#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// A manager that draws nothing (JSON mode, tests)
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Add a spinner for one job
    pub fn job_spinner(&self, label: &str) -> JobSpinner {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {prefix}: {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        JobSpinner { bar }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Spinner of a single job
#[derive(Clone)]
pub struct JobSpinner {
    bar: ProgressBar,
}

impl JobSpinner {
    /// Update the status message
    pub fn update(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Finish with a success line
    pub fn succeed(&self, message: &str) {
        self.bar.finish_with_message(format!("✅ {}", message));
    }

    /// Finish with a failure line
    pub fn fail(&self, message: &str) {
        self.bar.abandon_with_message(format!("❌ {}", message));
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }
}
