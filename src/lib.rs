//! # Upscale Relay Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare della pipeline video
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri front-end (chat bot)
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione, credenziali e validazione parametri
//! - `error`: Un tipo di errore per ogni stage + `JobError`
//! - `job`: Job, stati e transizioni ammesse
//! - `artifact`: File prodotti dagli stage e link pubblicati/monetizzati
//! - `workspace`: Directory temporanea per job, rimossa sempre
//! - `transcoder`: Preview 5s/360p e upscale 4K con FFmpeg
//! - `publisher`: Upload su Gofile
//! - `monetizer`: Link monetizzato via ShrinkEarn
//! - `delivery`: Confine con il front-end (trait + implementazione locale)
//! - `pipeline`: Orchestratore principale del processo
//! - `file_manager`: Discovery dei video in input per la CLI
//! - `progress` / `json_output`: Feedback a terminale o JSON
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use std::sync::Arc;
//! use upscale_relay::{Config, Job, LocalDelivery, Pipeline, SourceHandle};
//!
//! let delivery = Arc::new(LocalDelivery::new("out", false));
//! let pipeline = Pipeline::from_config(&config, delivery.clone())?;
//! let job = Job::new(SourceHandle::new("clip.mp4"));
//! delivery.register(&job);
//! let report = pipeline.run(job).await;
//! ```

pub mod artifact;
pub mod config;
pub mod delivery;
pub mod error;
pub mod file_manager;
pub mod job;
pub mod json_output;
pub mod monetizer;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod publisher;
pub mod tool_resolver;
pub mod transcoder;
pub mod utils;
pub mod workspace;

pub use artifact::{ArtifactRole, MediaArtifact, MonetizedLink, PublishedLink};
pub use config::Config;
pub use delivery::{ActionButton, DeliveryAdapter, LocalDelivery};
pub use error::{JobError, MonetizeError, PublishError, SourceError, TeardownError, TranscodeError};
pub use file_manager::FileManager;
pub use job::{Job, JobId, JobState, SourceHandle, Stage};
pub use monetizer::{Monetizer, ShrinkEarnMonetizer};
pub use pipeline::{JobReport, Pipeline, StageTiming};
pub use publisher::{GofilePublisher, Publisher};
pub use transcoder::{FfmpegTranscoder, Transcoder, VideoInfo};
pub use workspace::Workspace;
