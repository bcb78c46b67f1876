//! # Pipeline Orchestrator
//!
//! Orchestratore principale: esegue un job dall'acquisizione del video alla
//! consegna del risultato.
//!
//! ## Sequenza (strettamente lineare):
//! 1. Alloca il workspace del job e notifica "⏳ Processing your video..."
//! 2. `Download`: copia lo stream sorgente in `input.mp4`
//! 3. `Preview`: clip 5s/360p
//! 4. `Upscale`: versione 3840x2160
//! 5. `Publish`: upload dell'upscale sul file host
//! 6. `Monetize`: link monetizzato dal link pubblico
//! 7. `Deliver`: preview + bottone con link monetizzato al delivery adapter
//! 8. Sempre: rimozione del workspace (errori solo loggati)
//!
//! ## Gestione errori:
//! - Il primo errore interrompe la sequenza: nessuno stage successivo viene invocato
//! - Il job passa a `Failed` (o `Cancelled`), l'utente riceve un solo avviso
//!   generico, lo stage e la causa vanno nel log operativo
//! - Mai risultati parziali: la preview non viene mai consegnata da sola
//!
//! ## Concorrenza:
//! - Ogni job è un task indipendente con il proprio workspace
//! - Gli encode di tutti i job condividono un semaforo (`max_concurrent_transcodes`)
//! - Con `parallel_transcodes` preview e upscale girano in parallelo
//! - `run_with_cancel`: alla cancellazione lo stage in corso viene droppato
//!   (FFmpeg ucciso, richieste HTTP interrotte) e il workspace rimosso comunque
//! - La consegna non è cancellabile: una volta iniziata arriva fino in fondo

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::artifact::{ArtifactRole, MediaArtifact, MonetizedLink};
use crate::config::Config;
use crate::delivery::{ActionButton, DeliveryAdapter, FAILURE_TEXT, PREVIEW_CAPTION, PROCESSING_TEXT};
use crate::error::{JobError, SourceError, TranscodeError};
use crate::job::{Job, JobId, JobState, SourceHandle, Stage};
use crate::monetizer::{Monetizer, ShrinkEarnMonetizer};
use crate::publisher::{GofilePublisher, Publisher};
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use crate::utils::format_size;
use crate::workspace::Workspace;

/// Wall-clock time spent in one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// Terminal summary of one job
#[derive(Debug)]
pub struct JobReport {
    pub job_id: JobId,
    pub source: SourceHandle,
    pub state: JobState,
    pub history: Vec<JobState>,
    /// Stage that was running when the job failed
    pub failed_stage: Option<Stage>,
    pub timings: Vec<StageTiming>,
    pub outcome: Result<MonetizedLink, JobError>,
    pub elapsed: Duration,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs jobs through transcode → publish → monetize → deliver
pub struct Pipeline {
    transcoder: Arc<dyn Transcoder>,
    publisher: Arc<dyn Publisher>,
    monetizer: Arc<dyn Monetizer>,
    delivery: Arc<dyn DeliveryAdapter>,
    workspace_root: PathBuf,
    parallel_transcodes: bool,
    transcode_permits: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        transcoder: Arc<dyn Transcoder>,
        publisher: Arc<dyn Publisher>,
        monetizer: Arc<dyn Monetizer>,
        delivery: Arc<dyn DeliveryAdapter>,
    ) -> Self {
        Self {
            transcoder,
            publisher,
            monetizer,
            delivery,
            workspace_root: config.workspace_root(),
            parallel_transcodes: config.parallel_transcodes,
            transcode_permits: Arc::new(Semaphore::new(config.max_concurrent_transcodes.max(1))),
        }
    }

    /// Build the production pipeline (ffmpeg, Gofile, ShrinkEarn) around `delivery`
    pub fn from_config(config: &Config, delivery: Arc<dyn DeliveryAdapter>) -> anyhow::Result<Self> {
        config.validate()?;
        config.require_credentials()?;

        let transcoder = FfmpegTranscoder::new(config)?;
        debug!("Using ffmpeg at {}", transcoder.ffmpeg_path().display());

        Ok(Self::new(
            config,
            Arc::new(transcoder),
            Arc::new(GofilePublisher::new(config)?),
            Arc::new(ShrinkEarnMonetizer::new(config)?),
            delivery,
        ))
    }

    /// Run a job to completion or failure
    pub async fn run(&self, job: Job) -> JobReport {
        self.run_with_cancel(job, CancellationToken::new()).await
    }

    /// Run a job, aborting the in-flight stage when `cancel` fires
    pub async fn run_with_cancel(&self, mut job: Job, cancel: CancellationToken) -> JobReport {
        let start_time = Instant::now();
        let mut timings = Vec::new();
        info!(job_id = %job.id, source = %job.source, "🎬 Job started");

        let (outcome, failed_stage) = match Workspace::create(&self.workspace_root, &job.id) {
            Ok(workspace) => {
                self.delivery.notify_progress(&job.id, PROCESSING_TEXT).await;

                let produced = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(StageFailure::unattributed(JobError::Cancelled)),
                    result = self.produce(&mut job, &workspace, &mut timings) => result,
                };

                // delivery is never interrupted once started
                let outcome = match produced {
                    Ok((preview, monetized)) => {
                        self.deliver(&mut job, &preview, monetized, &mut timings).await
                    }
                    Err(failure) => Err(failure),
                };

                // notify before teardown, the failure path never touches the workspace
                let concluded = self.conclude(&mut job, outcome).await;
                workspace.teardown();
                concluded
            }
            Err(e) => {
                self.conclude(&mut job, Err(StageFailure::unattributed(JobError::Workspace(e))))
                    .await
            }
        };

        let elapsed = start_time.elapsed();
        match &outcome {
            Ok(link) => info!(
                job_id = %job.id,
                "✅ Job delivered in {:.1}s: {}",
                elapsed.as_secs_f64(),
                link
            ),
            Err(e) => info!(
                job_id = %job.id,
                "❌ Job {:?} after {:.1}s ({})",
                job.state(),
                elapsed.as_secs_f64(),
                e.kind()
            ),
        }

        JobReport {
            job_id: job.id,
            source: job.source.clone(),
            state: job.state(),
            history: job.history().to_vec(),
            failed_stage,
            timings,
            outcome,
            elapsed,
        }
    }

    /// Run every stage up to the monetized link
    async fn produce(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        timings: &mut Vec<StageTiming>,
    ) -> Result<(MediaArtifact, MonetizedLink), StageFailure> {
        let source = timed(Stage::Download, timings, self.download(&job.source, workspace)).await?;
        advance(job, Stage::Download);

        let (preview, upscaled) = if self.parallel_transcodes {
            let started = Instant::now();
            let (preview, upscaled) = tokio::try_join!(
                async {
                    self.preview(&source, workspace)
                        .await
                        .map_err(|e| StageFailure::at(Stage::Preview, e))
                },
                async {
                    self.upscale(&source, workspace)
                        .await
                        .map_err(|e| StageFailure::at(Stage::Upscale, e))
                }
            )?;
            let elapsed = started.elapsed();
            timings.push(StageTiming { stage: Stage::Preview, elapsed });
            timings.push(StageTiming { stage: Stage::Upscale, elapsed });
            advance(job, Stage::Preview);
            advance(job, Stage::Upscale);
            (preview, upscaled)
        } else {
            let preview = timed(Stage::Preview, timings, self.preview(&source, workspace)).await?;
            advance(job, Stage::Preview);
            let upscaled = timed(Stage::Upscale, timings, self.upscale(&source, workspace)).await?;
            advance(job, Stage::Upscale);
            (preview, upscaled)
        };

        let published = timed(Stage::Publish, timings, self.publisher.upload(&upscaled)).await?;
        advance(job, Stage::Publish);

        let monetized = timed(Stage::Monetize, timings, self.monetizer.shorten(&published)).await?;
        advance(job, Stage::Monetize);

        Ok((preview, monetized))
    }

    /// Hand the preview and the monetized link to the requester
    async fn deliver(
        &self,
        job: &mut Job,
        preview: &MediaArtifact,
        monetized: MonetizedLink,
        timings: &mut Vec<StageTiming>,
    ) -> Result<MonetizedLink, StageFailure> {
        let action = ActionButton::download(monetized.as_str());
        timed(
            Stage::Deliver,
            timings,
            self.delivery
                .deliver_result(&job.id, preview.path(), PREVIEW_CAPTION, &action),
        )
        .await?;
        advance(job, Stage::Deliver);
        Ok(monetized)
    }

    /// Copy the source stream into the workspace
    async fn download(
        &self,
        handle: &SourceHandle,
        workspace: &Workspace,
    ) -> Result<MediaArtifact, SourceError> {
        let mut stream = self.delivery.open_source(handle).await?;
        let artifact = workspace.artifact(ArtifactRole::Source);

        let mut file = tokio::fs::File::create(artifact.path()).await?;
        let bytes = tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;

        if bytes == 0 {
            return Err(SourceError::Empty);
        }
        debug!("Downloaded source ({})", format_size(bytes));
        Ok(artifact)
    }

    async fn preview(
        &self,
        source: &MediaArtifact,
        workspace: &Workspace,
    ) -> Result<MediaArtifact, TranscodeError> {
        let _permit = self
            .transcode_permits
            .acquire()
            .await
            .map_err(|_| TranscodeError::PoolClosed)?;
        self.transcoder
            .make_preview(source, workspace.artifact(ArtifactRole::Preview))
            .await
    }

    async fn upscale(
        &self,
        source: &MediaArtifact,
        workspace: &Workspace,
    ) -> Result<MediaArtifact, TranscodeError> {
        let _permit = self
            .transcode_permits
            .acquire()
            .await
            .map_err(|_| TranscodeError::PoolClosed)?;
        self.transcoder
            .make_upscale(source, workspace.artifact(ArtifactRole::Upscaled))
            .await
    }

    /// Move the job to its terminal state and notify the requester exactly once
    async fn conclude(
        &self,
        job: &mut Job,
        outcome: Result<MonetizedLink, StageFailure>,
    ) -> (Result<MonetizedLink, JobError>, Option<Stage>) {
        match outcome {
            Ok(link) => {
                self.delivery.clear_progress(&job.id).await;
                (Ok(link), None)
            }
            Err(StageFailure { stage, error }) => {
                let stage = stage.or_else(|| failed_stage(job.history()));
                let cancelled = matches!(error, JobError::Cancelled);
                if let Err(illegal) = job.abort(cancelled) {
                    error!(job_id = %job.id, "{}", illegal);
                }
                error!(
                    job_id = %job.id,
                    stage = ?stage,
                    kind = error.kind(),
                    error = %error,
                    "Job failed"
                );
                self.delivery.notify_failure(&job.id, FAILURE_TEXT).await;
                (Err(error), stage)
            }
        }
    }
}

/// A job error and, when known, the stage that raised it
#[derive(Debug)]
struct StageFailure {
    stage: Option<Stage>,
    error: JobError,
}

impl StageFailure {
    fn at(stage: Stage, error: impl Into<JobError>) -> Self {
        Self {
            stage: Some(stage),
            error: error.into(),
        }
    }

    fn unattributed(error: JobError) -> Self {
        Self { stage: None, error }
    }
}

/// The stage that was running when a job stopped: the one whose entry state
/// is the last non-terminal state in the history
fn failed_stage(history: &[JobState]) -> Option<Stage> {
    let last_live = history.iter().rev().find(|s| !s.is_terminal())?;
    Stage::ALL.into_iter().find(|stage| stage.entry_state() == *last_live)
}

fn advance(job: &mut Job, stage: Stage) {
    match job.complete(stage) {
        Ok(state) => debug!(job_id = %job.id, "{} done -> {:?}", stage, state),
        Err(illegal) => error!(job_id = %job.id, "{}", illegal),
    }
}

async fn timed<T, E, F>(
    stage: Stage,
    timings: &mut Vec<StageTiming>,
    fut: F,
) -> Result<T, StageFailure>
where
    F: Future<Output = Result<T, E>>,
    E: Into<JobError>,
{
    let started = Instant::now();
    let result = fut.await;
    timings.push(StageTiming {
        stage,
        elapsed: started.elapsed(),
    });
    result.map_err(|e| StageFailure::at(stage, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::PublishedLink;
    use crate::delivery::SourceStream;
    use crate::error::{DeliveryError, MonetizeError, PublishError};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct FakeTranscoder {
        fail_preview: bool,
        fail_upscale: bool,
        upscale_delay: Option<Duration>,
        calls: Mutex<Vec<Stage>>,
        workspaces: Mutex<Vec<PathBuf>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeTranscoder {
        async fn encode(
            &self,
            stage: Stage,
            source: &MediaArtifact,
            target: MediaArtifact,
            delay: Option<Duration>,
        ) -> Result<MediaArtifact, TranscodeError> {
            self.calls.lock().unwrap().push(stage);
            if let Some(parent) = source.path().parent() {
                self.workspaces.lock().unwrap().push(parent.to_path_buf());
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(delay.unwrap_or(Duration::from_millis(20))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            assert!(source.path().exists(), "source must be in the workspace");
            tokio::fs::write(target.path(), format!("{}", stage)).await.unwrap();
            Ok(target)
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn make_preview(
            &self,
            source: &MediaArtifact,
            target: MediaArtifact,
        ) -> Result<MediaArtifact, TranscodeError> {
            if self.fail_preview {
                self.calls.lock().unwrap().push(Stage::Preview);
                return Err(TranscodeError::failed(Stage::Preview, Some(1), "Invalid data found"));
            }
            self.encode(Stage::Preview, source, target, None).await
        }

        async fn make_upscale(
            &self,
            source: &MediaArtifact,
            target: MediaArtifact,
        ) -> Result<MediaArtifact, TranscodeError> {
            if self.fail_upscale {
                self.calls.lock().unwrap().push(Stage::Upscale);
                return Err(TranscodeError::failed(Stage::Upscale, Some(1), "Conversion failed"));
            }
            self.encode(Stage::Upscale, source, target, self.upscale_delay).await
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        reject: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn upload(&self, artifact: &MediaArtifact) -> Result<PublishedLink, PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(artifact.role(), ArtifactRole::Upscaled);
            if self.reject {
                return Err(PublishError::Rejected("error".to_string()));
            }
            Ok(PublishedLink::new(format!(
                "https://gofile.io/d/{}",
                artifact.path().parent().unwrap().file_name().unwrap().to_string_lossy()
            )))
        }
    }

    #[derive(Default)]
    struct FakeMonetizer {
        reject: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Monetizer for FakeMonetizer {
        async fn shorten(&self, link: &PublishedLink) -> Result<MonetizedLink, MonetizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(MonetizeError::Rejected {
                    status: "error".to_string(),
                    message: String::new(),
                });
            }
            let id = link.as_str().rsplit('/').next().unwrap_or_default().to_string();
            Ok(MonetizedLink::new(format!("https://shrinkearn.com/{}", id), link.clone()))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Progress(JobId, String),
        Cleared(JobId),
        Delivered {
            job: JobId,
            preview_existed: bool,
            caption: String,
            url: String,
        },
        Failed(JobId, String),
    }

    #[derive(Default)]
    struct RecordingDelivery {
        source: Option<Vec<u8>>,
        fail_delivery: bool,
        delivery_delay: Option<Duration>,
        delivery_started: tokio::sync::Notify,
        events: Mutex<Vec<Event>>,
    }

    impl RecordingDelivery {
        fn with_source(bytes: &[u8]) -> Self {
            Self {
                source: Some(bytes.to_vec()),
                ..Default::default()
            }
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn deliveries(&self, job: &JobId) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, Event::Delivered { job: j, .. } if j == job))
                .count()
        }

        fn failures(&self, job: &JobId) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, Event::Failed(j, _) if j == job))
                .count()
        }
    }

    #[async_trait]
    impl DeliveryAdapter for RecordingDelivery {
        async fn open_source(&self, source: &SourceHandle) -> Result<SourceStream, SourceError> {
            match &self.source {
                Some(bytes) => Ok(Box::new(std::io::Cursor::new(bytes.clone()))),
                None => Err(SourceError::Unavailable(source.to_string())),
            }
        }

        async fn notify_progress(&self, job: &JobId, text: &str) {
            self.events.lock().unwrap().push(Event::Progress(*job, text.to_string()));
        }

        async fn clear_progress(&self, job: &JobId) {
            self.events.lock().unwrap().push(Event::Cleared(*job));
        }

        async fn deliver_result(
            &self,
            job: &JobId,
            preview: &Path,
            caption: &str,
            action: &ActionButton,
        ) -> Result<(), DeliveryError> {
            self.delivery_started.notify_one();
            if let Some(delay) = self.delivery_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_delivery {
                return Err(DeliveryError("chat unreachable".to_string()));
            }
            self.events.lock().unwrap().push(Event::Delivered {
                job: *job,
                preview_existed: preview.exists(),
                caption: caption.to_string(),
                url: action.url.clone(),
            });
            Ok(())
        }

        async fn notify_failure(&self, job: &JobId, text: &str) {
            self.events.lock().unwrap().push(Event::Failed(*job, text.to_string()));
        }
    }

    struct Harness {
        root: TempDir,
        transcoder: Arc<FakeTranscoder>,
        publisher: Arc<FakePublisher>,
        monetizer: Arc<FakeMonetizer>,
        delivery: Arc<RecordingDelivery>,
        config: Config,
    }

    impl Harness {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let config = Config {
                workspace_root: Some(root.path().to_path_buf()),
                ..Default::default()
            };
            Self {
                root,
                transcoder: Arc::new(FakeTranscoder::default()),
                publisher: Arc::new(FakePublisher::default()),
                monetizer: Arc::new(FakeMonetizer::default()),
                delivery: Arc::new(RecordingDelivery::with_source(b"10s of 480p video")),
                config,
            }
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                &self.config,
                self.transcoder.clone(),
                self.publisher.clone(),
                self.monetizer.clone(),
                self.delivery.clone(),
            )
        }

        fn leftover_workspaces(&self) -> usize {
            std::fs::read_dir(self.root.path()).unwrap().count()
        }
    }

    fn job() -> Job {
        Job::new(SourceHandle::new("tg-file-1"))
    }

    #[tokio::test]
    async fn test_successful_job_delivers_once() {
        let h = Harness::new();
        assert_eq!(h.leftover_workspaces(), 0);

        let job = job();
        let job_id = job.id;
        let report = h.pipeline().run(job).await;

        let link = assert_ok!(report.outcome.as_ref());
        assert!(link.as_str().starts_with("https://shrinkearn.com/"));
        assert_ne!(link.as_str(), link.target().as_str());
        assert_eq!(report.state, JobState::Delivered);
        assert_eq!(report.failed_stage, None);
        assert_eq!(
            report.history,
            vec![
                JobState::Created,
                JobState::Downloaded,
                JobState::PreviewReady,
                JobState::UpscaledReady,
                JobState::Published,
                JobState::Monetized,
                JobState::Delivered,
            ]
        );
        assert_eq!(report.timings.len(), Stage::ALL.len());

        assert_eq!(
            h.delivery.events(),
            vec![
                Event::Progress(job_id, PROCESSING_TEXT.to_string()),
                Event::Delivered {
                    job: job_id,
                    preview_existed: true,
                    caption: PREVIEW_CAPTION.to_string(),
                    url: link.as_str().to_string(),
                },
                Event::Cleared(job_id),
            ]
        );
        assert_eq!(*h.transcoder.calls.lock().unwrap(), vec![Stage::Preview, Stage::Upscale]);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_publish_rejection_skips_monetizer() {
        let mut h = Harness::new();
        h.publisher = Arc::new(FakePublisher {
            reject: true,
            ..Default::default()
        });

        let job = job();
        let job_id = job.id;
        let report = h.pipeline().run(job).await;

        let err = assert_err!(report.outcome.as_ref());
        assert_eq!(err.kind(), "PublishError");
        assert_eq!(report.state, JobState::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Publish));
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.monetizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.delivery.deliveries(&job_id), 0);
        assert_eq!(h.delivery.failures(&job_id), 1);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_preview_failure_short_circuits() {
        let mut h = Harness::new();
        h.transcoder = Arc::new(FakeTranscoder {
            fail_preview: true,
            ..Default::default()
        });

        let job = job();
        let job_id = job.id;
        let report = h.pipeline().run(job).await;

        assert!(matches!(
            report.outcome,
            Err(JobError::Transcode(TranscodeError::Failed { code: Some(1), .. }))
        ));
        assert_eq!(report.failed_stage, Some(Stage::Preview));
        // upscale never invoked
        assert_eq!(*h.transcoder.calls.lock().unwrap(), vec![Stage::Preview]);
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.monetizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.delivery.failures(&job_id), 1);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_failure_notice_is_generic() {
        let mut h = Harness::new();
        h.transcoder = Arc::new(FakeTranscoder {
            fail_preview: true,
            ..Default::default()
        });

        let job = job();
        let job_id = job.id;
        h.pipeline().run(job).await;

        let notices: Vec<String> = h
            .delivery
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Failed(j, text) if j == job_id => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(notices, vec![FAILURE_TEXT.to_string()]);
        assert!(!notices[0].contains("Invalid data found"));
    }

    #[tokio::test]
    async fn test_unavailable_source() {
        let mut h = Harness::new();
        h.delivery = Arc::new(RecordingDelivery::default());

        let report = h.pipeline().run(job()).await;
        assert!(matches!(report.outcome, Err(JobError::Source(SourceError::Unavailable(_)))));
        assert_eq!(report.failed_stage, Some(Stage::Download));
        assert!(h.transcoder.calls.lock().unwrap().is_empty());
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let mut h = Harness::new();
        h.delivery = Arc::new(RecordingDelivery::with_source(b""));

        let report = h.pipeline().run(job()).await;
        assert!(matches!(report.outcome, Err(JobError::Source(SourceError::Empty))));
        assert!(h.transcoder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_monetize_failure_delivers_nothing() {
        let mut h = Harness::new();
        h.monetizer = Arc::new(FakeMonetizer {
            reject: true,
            ..Default::default()
        });

        let job = job();
        let job_id = job.id;
        let report = h.pipeline().run(job).await;

        assert_eq!(report.outcome.as_ref().unwrap_err().kind(), "MonetizeError");
        assert_eq!(report.failed_stage, Some(Stage::Monetize));
        assert_eq!(h.delivery.deliveries(&job_id), 0);
        assert_eq!(h.delivery.failures(&job_id), 1);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_becomes_failure_notice() {
        let mut h = Harness::new();
        h.delivery = Arc::new(RecordingDelivery {
            fail_delivery: true,
            ..RecordingDelivery::with_source(b"video")
        });

        let job = job();
        let job_id = job.id;
        let report = h.pipeline().run(job).await;

        assert_eq!(report.outcome.as_ref().unwrap_err().kind(), "DeliveryError");
        assert_eq!(report.failed_stage, Some(Stage::Deliver));
        assert_eq!(h.delivery.failures(&job_id), 1);
        assert!(!h.delivery.events().contains(&Event::Cleared(job_id)));
    }

    #[tokio::test]
    async fn test_missing_workspace_root_still_notifies() {
        let mut h = Harness::new();
        h.config.workspace_root = Some(PathBuf::from("/definitely/not/here"));

        let job = job();
        let job_id = job.id;
        let report = h.pipeline().run(job).await;

        assert!(matches!(report.outcome, Err(JobError::Workspace(_))));
        assert_eq!(report.state, JobState::Failed);
        assert_eq!(h.delivery.failures(&job_id), 1);
        assert!(h.transcoder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_isolated() {
        let mut h = Harness::new();
        h.config.max_concurrent_transcodes = 4;
        let pipeline = h.pipeline();

        let (a, b) = (job(), job());
        let (a_id, b_id) = (a.id, b.id);
        let (ra, rb) = tokio::join!(pipeline.run(a), pipeline.run(b));

        let (la, lb) = (ra.outcome.unwrap(), rb.outcome.unwrap());
        assert_ne!(la, lb);
        assert_eq!(h.delivery.deliveries(&a_id), 1);
        assert_eq!(h.delivery.deliveries(&b_id), 1);

        // each job encoded from its own workspace, twice
        let workspaces = h.transcoder.workspaces.lock().unwrap().clone();
        assert_eq!(workspaces.len(), 4);
        let distinct: std::collections::HashSet<_> = workspaces.iter().collect();
        assert_eq!(distinct.len(), 2);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_transcodes_are_bounded() {
        let mut h = Harness::new();
        h.config.max_concurrent_transcodes = 1;
        let pipeline = h.pipeline();

        let reports = futures::future::join_all((0..3).map(|_| pipeline.run(job()))).await;

        assert!(reports.iter().all(JobReport::is_success));
        assert_eq!(h.transcoder.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(h.transcoder.calls.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_parallel_transcodes_keep_linear_states() {
        let mut h = Harness::new();
        h.config.parallel_transcodes = true;
        h.config.max_concurrent_transcodes = 2;
        let report = h.pipeline().run(job()).await;

        assert!(report.is_success());
        assert_eq!(report.history.len(), 7);
        assert_eq!(h.transcoder.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parallel_upscale_failure_names_upscale() {
        let mut h = Harness::new();
        h.config.parallel_transcodes = true;
        h.config.max_concurrent_transcodes = 2;
        h.transcoder = Arc::new(FakeTranscoder {
            fail_upscale: true,
            ..Default::default()
        });

        let job = job();
        let job_id = job.id;
        let report = h.pipeline().run(job).await;

        assert!(matches!(
            report.outcome,
            Err(JobError::Transcode(TranscodeError::Failed { stage: Stage::Upscale, .. }))
        ));
        assert_eq!(report.failed_stage, Some(Stage::Upscale));
        assert_eq!(report.state, JobState::Failed);
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.delivery.failures(&job_id), 1);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_parallel_preview_failure_names_preview() {
        let mut h = Harness::new();
        h.config.parallel_transcodes = true;
        h.config.max_concurrent_transcodes = 2;
        h.transcoder = Arc::new(FakeTranscoder {
            fail_preview: true,
            ..Default::default()
        });

        let report = h.pipeline().run(job()).await;
        assert_eq!(report.failed_stage, Some(Stage::Preview));
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_delivery_completes_delivery() {
        let mut h = Harness::new();
        h.delivery = Arc::new(RecordingDelivery {
            delivery_delay: Some(Duration::from_millis(500)),
            ..RecordingDelivery::with_source(b"video")
        });
        let pipeline = h.pipeline();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let delivery = h.delivery.clone();
        tokio::spawn(async move {
            delivery.delivery_started.notified().await;
            trigger.cancel();
        });

        let job = job();
        let job_id = job.id;
        let report = pipeline.run_with_cancel(job, cancel).await;

        assert!(report.is_success());
        assert_eq!(report.state, JobState::Delivered);
        assert_eq!(h.delivery.deliveries(&job_id), 1);
        assert_eq!(h.delivery.failures(&job_id), 0);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_tears_down_workspace() {
        let mut h = Harness::new();
        h.transcoder = Arc::new(FakeTranscoder {
            upscale_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let pipeline = h.pipeline();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let job = job();
        let job_id = job.id;
        let started = Instant::now();
        let report = pipeline.run_with_cancel(job, cancel).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(report.outcome, Err(JobError::Cancelled)));
        assert_eq!(report.state, JobState::Cancelled);
        assert_eq!(report.failed_stage, Some(Stage::Upscale));
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.delivery.failures(&job_id), 1);
        assert_eq!(h.leftover_workspaces(), 0);
    }

    #[test]
    fn test_failed_stage_from_history() {
        use JobState::*;
        assert_eq!(failed_stage(&[Created, Failed]), Some(Stage::Download));
        assert_eq!(
            failed_stage(&[Created, Downloaded, PreviewReady, UpscaledReady, Failed]),
            Some(Stage::Publish)
        );
        assert_eq!(failed_stage(&[Created, Downloaded, Cancelled]), Some(Stage::Preview));
    }
}
