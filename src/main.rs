//! # Upscale Relay - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap` (credenziali da env / `.env`)
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione della configurazione (file JSON + override da CLI/env)
//! - Un job per ogni video in input, tutti in parallelo
//! - Ctrl-C cancella i job in corso (i workspace vengono rimossi comunque)
//!
//! ## Flusso di esecuzione:
//! 1. Carica `.env` e parsa gli argomenti CLI
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` vince)
//! 3. Carica e valida la configurazione
//! 4. Espande gli input (file + directory) in una lista di video
//! 5. Avvia la pipeline per ogni video e stampa il riepilogo
//!
//! ## Esempio di utilizzo:
//! ```bash
//! GOFILE_TOKEN=... GOFILE_FOLDER_ID=... SHRINKEARN_API_KEY=... \
//!     upscale-relay ./videos --output ./previews --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use upscale_relay::json_output::JsonMessage;
use upscale_relay::platform::PlatformCommands;
use upscale_relay::{Config, FileManager, Job, LocalDelivery, Pipeline, SourceHandle};

#[derive(Parser)]
#[command(name = "upscale-relay")]
#[command(about = "Make a 5s preview and a 4K upscale of each video, publish the upscale and return a monetized link")]
struct Args {
    /// Video files or directories to process
    #[arg(required_unless_present = "check_tools")]
    inputs: Vec<PathBuf>,

    /// Directory receiving the previews
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Configuration file (default: <config dir>/upscale-relay/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gofile account token
    #[arg(long, env = "GOFILE_TOKEN", hide_env_values = true)]
    gofile_token: Option<String>,

    /// Gofile destination folder
    #[arg(long, env = "GOFILE_FOLDER_ID")]
    gofile_folder_id: Option<String>,

    /// ShrinkEarn API key
    #[arg(long, env = "SHRINKEARN_API_KEY", hide_env_values = true)]
    shrinkearn_api_key: Option<String>,

    /// Chat bot token, used only by bot front-ends
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Directory where per-job workspaces are created
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Run preview and upscale of a job at the same time
    #[arg(long)]
    parallel_transcodes: bool,

    /// Maximum number of FFmpeg encodes running at once across all jobs
    #[arg(long)]
    max_concurrent_transcodes: Option<usize>,

    /// Per-encode timeout in seconds
    #[arg(long)]
    transcode_timeout: Option<u64>,

    /// Emit one JSON line per event on stdout
    #[arg(long)]
    json: bool,

    /// Print the external tools report and exit
    #[arg(long)]
    check_tools: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Layer CLI/env values over the file configuration
    fn apply_to(&self, config: &mut Config) {
        if let Some(ref token) = self.gofile_token {
            config.upload_token = token.clone();
        }
        if let Some(ref folder) = self.gofile_folder_id {
            config.upload_folder_id = folder.clone();
        }
        if let Some(ref key) = self.shrinkearn_api_key {
            config.monetizer_api_key = key.clone();
        }
        if self.bot_token.is_some() {
            config.bot_token = self.bot_token.clone();
        }
        if self.workspace_root.is_some() {
            config.workspace_root = self.workspace_root.clone();
        }
        if self.parallel_transcodes {
            config.parallel_transcodes = true;
        }
        if let Some(permits) = self.max_concurrent_transcodes {
            config.max_concurrent_transcodes = permits;
        }
        if let Some(secs) = self.transcode_timeout {
            config.transcode_timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads the env-backed args
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "upscale_relay=debug" } else { "upscale_relay=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.check_tools {
        info!("System: {}", PlatformCommands::system_info());
        println!("{}", PlatformCommands::instance().get_tools_report());
        return Ok(());
    }

    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match config_path {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;
    config.require_credentials()?;
    config.log_summary();

    let sources = FileManager::collect_inputs(&args.inputs)?;
    if sources.is_empty() {
        warn!("No videos found in the given inputs");
        return Ok(());
    }
    info!("🎬 {} video(s) to process", sources.len());

    let delivery = Arc::new(LocalDelivery::new(&args.output, args.json));
    let pipeline = Arc::new(Pipeline::from_config(&config, delivery.clone())?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling running jobs");
            on_signal.cancel();
        }
    });

    let start_time = Instant::now();
    let handles: Vec<_> = sources
        .iter()
        .map(|source| {
            let job = Job::new(SourceHandle::new(source.to_string_lossy()));
            delivery.register(&job);
            let pipeline = pipeline.clone();
            let cancel = cancel.child_token();
            tokio::spawn(async move { pipeline.run_with_cancel(job, cancel).await })
        })
        .collect();

    let mut delivered = 0;
    let mut failed = 0;
    for result in futures::future::join_all(handles).await {
        match result {
            Ok(report) if report.is_success() => delivered += 1,
            Ok(report) => {
                failed += 1;
                if let Some(stage) = report.failed_stage {
                    info!("  • {} failed at {}", report.source, stage);
                }
            }
            Err(e) => {
                failed += 1;
                error!("Job task panicked: {}", e);
            }
        }
    }

    let duration = start_time.elapsed();
    if args.json {
        JsonMessage::Summary {
            total: sources.len(),
            delivered,
            failed,
            duration_seconds: duration.as_secs_f64(),
        }
        .emit();
    }
    info!(
        "📊 {} delivered, {} failed in {:.1}s",
        delivered,
        failed,
        duration.as_secs_f64()
    );

    if failed > 0 {
        return Err(anyhow::anyhow!("{} of {} job(s) failed", failed, sources.len()));
    }
    Ok(())
}
