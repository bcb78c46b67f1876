//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config`, costruita una volta all'avvio e passata
//!   esplicitamente ai costruttori dei componenti (mai stato globale)
//! - Fornisce validazione dei parametri
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri non segreti
//!
//! ## Parametri di configurazione:
//! - `upload_token` / `upload_folder_id`: credenziali del file host (Gofile)
//! - `monetizer_api_key`: API key del servizio di shortening (ShrinkEarn)
//! - `bot_token`: credenziale del front-end conversazionale (opzionale)
//! - `upload_timeout_secs`: timeout upload (default: 60)
//! - `shorten_timeout_secs`: timeout shortening (default: 30)
//! - `transcode_timeout_secs`: timeout per ogni encode (default: 600)
//! - `parallel_transcodes`: preview e upscale in parallelo (default: false)
//! - `max_concurrent_transcodes`: encode simultanei tra tutti i job (default: 1)
//! - `workspace_root`: directory dei workspace (default: None = temp di sistema)
//!
//! ## Credenziali:
//! Le credenziali non hanno default: arrivano da env (`GOFILE_TOKEN`,
//! `GOFILE_FOLDER_ID`, `SHRINKEARN_API_KEY`, `TELEGRAM_BOT_TOKEN`) o dal file.
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     upload_token: "token".into(),
//!     upload_folder_id: "folder".into(),
//!     monetizer_api_key: "key".into(),
//!     ..Default::default()
//! };
//! config.validate()?;
//! config.require_credentials()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://api.gofile.io/uploadFile";
pub const DEFAULT_SHORTENER_ENDPOINT: &str = "https://shrinkearn.com/api";

/// Immutable runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat front-end credential (unused by the pipeline itself)
    pub bot_token: Option<String>,
    /// File host account token
    pub upload_token: String,
    /// File host destination folder
    pub upload_folder_id: String,
    /// Link shortener API key
    pub monetizer_api_key: String,
    /// Multipart upload endpoint
    pub upload_endpoint: String,
    /// Link shortener endpoint
    pub shortener_endpoint: String,
    /// Upper bound on one upload call, in seconds
    pub upload_timeout_secs: u64,
    /// Upper bound on one shortener call, in seconds
    pub shorten_timeout_secs: u64,
    /// Upper bound on one encode, in seconds
    pub transcode_timeout_secs: u64,
    /// Run preview and upscale encodes concurrently
    pub parallel_transcodes: bool,
    /// Encodes allowed to run at once across all jobs
    pub max_concurrent_transcodes: usize,
    /// Parent directory for job workspaces (None = system temp dir)
    pub workspace_root: Option<PathBuf>,
    /// Explicit ffmpeg binary (None = resolve from TOOLS_DIR / PATH)
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary (None = resolve from TOOLS_DIR / PATH)
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            upload_token: String::new(),
            upload_folder_id: String::new(),
            monetizer_api_key: String::new(),
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            shortener_endpoint: DEFAULT_SHORTENER_ENDPOINT.to_string(),
            upload_timeout_secs: 60,
            shorten_timeout_secs: 30,
            transcode_timeout_secs: 600,
            parallel_transcodes: false,
            max_concurrent_transcodes: 1,
            workspace_root: None,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Upload timeout must be greater than 0"));
        }

        if self.shorten_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Shortener timeout must be greater than 0"));
        }

        if self.transcode_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Transcode timeout must be greater than 0"));
        }

        if self.max_concurrent_transcodes == 0 {
            return Err(anyhow::anyhow!("Concurrent transcodes must be greater than 0"));
        }

        for (name, endpoint) in [
            ("Upload endpoint", &self.upload_endpoint),
            ("Shortener endpoint", &self.shortener_endpoint),
        ] {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow::anyhow!("{} must be an http(s) URL: {}", name, endpoint));
            }
        }

        if let Some(ref root) = self.workspace_root {
            if !root.is_dir() {
                return Err(anyhow::anyhow!("Workspace root is not a directory: {}", root.display()));
            }
        }

        Ok(())
    }

    /// Check that every credential the pipeline needs is present
    pub fn require_credentials(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("GOFILE_TOKEN", &self.upload_token),
            ("GOFILE_FOLDER_ID", &self.upload_folder_id),
            ("SHRINKEARN_API_KEY", &self.monetizer_api_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Missing credentials: {}", missing.join(", ")))
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn shorten_timeout(&self) -> Duration {
        Duration::from_secs(self.shorten_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    /// Directory where job workspaces are created
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Default location of the config file (`<config dir>/upscale-relay/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("upscale-relay").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Log the non-secret part of the configuration
    pub fn log_summary(&self) {
        info!("🔧 Pipeline configuration:");
        info!("  • Upload endpoint: {} (timeout {}s)", self.upload_endpoint, self.upload_timeout_secs);
        info!("  • Shortener endpoint: {} (timeout {}s)", self.shortener_endpoint, self.shorten_timeout_secs);
        info!("  • Transcode timeout: {}s", self.transcode_timeout_secs);
        info!(
            "  • Transcodes: {} concurrent, preview/upscale {}",
            self.max_concurrent_transcodes,
            if self.parallel_transcodes { "in parallel" } else { "sequential" }
        );
        info!("  • Workspace root: {}", self.workspace_root().display());
    }
}
