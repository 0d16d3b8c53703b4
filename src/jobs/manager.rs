use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use super::error::{diagnostic_tail, JobFailure, RenderError};
use super::job::{Job, JobId};
use super::store::JobStore;
use crate::config::{EncoderSettings, JobsConfig};
use crate::encode::ffmpeg::EncoderCommand;
use crate::render::meta::RenderMeta;

const OUTPUT_FILE: &str = "final.mp4";
const DEFAULT_IMAGE_NAME: &str = "image.png";
const DEFAULT_AUDIO_NAME: &str = "audio.wav";

/// An uploaded input file.
#[derive(Clone, Debug)]
pub struct Asset {
    pub name: String,
    pub data: Vec<u8>,
}

impl Asset {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, data))
    }
}

/// Everything a render needs; all three parts are required.
#[derive(Clone, Debug, Default)]
pub struct RenderRequest {
    pub image: Option<Asset>,
    pub audio: Option<Asset>,
    pub meta: Option<RenderMeta>,
}

impl RenderRequest {
    fn into_parts(self) -> Result<(Asset, Asset, RenderMeta), RenderError> {
        match (self.image, self.audio, self.meta) {
            (Some(image), Some(audio), Some(meta)) => Ok((image, audio, meta)),
            (image, audio, meta) => {
                let missing = [
                    (image.is_none(), "image"),
                    (audio.is_none(), "audio"),
                    (meta.is_none(), "meta"),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(RenderError::MissingInput { missing })
            }
        }
    }
}

/// Owns the job table and runs one encoder process per submitted job.
///
/// Each job gets two tasks: a progress ramp that nudges `progress` up while
/// the status is `running`, and a supervisor that waits for the encoder.
/// The supervisor stops the ramp and joins it before writing the terminal
/// state, so a late tick can never land after completion.
///
/// A hung encoder keeps its job in `running` indefinitely; there is no
/// timeout or cancellation.
pub struct RenderJobManager {
    store: Arc<JobStore>,
    encoder: EncoderSettings,
    work_dir: PathBuf,
    tick_interval: Duration,
}

impl RenderJobManager {
    pub fn new(encoder: EncoderSettings, jobs: &JobsConfig) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            encoder,
            work_dir: jobs.work_dir.clone(),
            tick_interval: jobs.tick_interval(),
        }
    }

    /// Validate, stage inputs, launch the encoder and return without waiting.
    ///
    /// Must be called from within a tokio runtime. A spawn failure is not an
    /// error here: the job is recorded as failed and its id returned.
    pub async fn submit(&self, request: RenderRequest) -> Result<JobId, RenderError> {
        let (image, audio, meta) = request.into_parts()?;

        let id = JobId::generate();
        let job_dir = self.work_dir.join(id.as_str());
        create_dir(&job_dir).await?;

        let image_name = scratch_name(&image.name, DEFAULT_IMAGE_NAME);
        let mut audio_name = scratch_name(&audio.name, DEFAULT_AUDIO_NAME);
        if audio_name == image_name {
            audio_name = format!("audio-{}", audio_name);
        }
        let image_path = job_dir.join(image_name);
        let audio_path = job_dir.join(audio_name);
        let staged = match write_asset(&image_path, &image.data).await {
            Ok(()) => write_asset(&audio_path, &audio.data).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            // Nothing references the job yet, so drop its scratch dir
            if let Err(cleanup) = tokio::fs::remove_dir_all(&job_dir).await {
                log::warn!("Failed to remove {}: {}", job_dir.display(), cleanup);
            }
            return Err(e);
        }

        let params = meta.normalize();
        let command = EncoderCommand::new(
            &self.encoder,
            &params,
            &image_path,
            &audio_path,
            &job_dir.join(OUTPUT_FILE),
        );

        self.store.insert(Job::running(id.clone()));
        log::info!(
            "Job {}: {}s @ {}fps, {}, zoom to {:.3}, {} beats ({} jobs tracked)",
            id,
            params.duration,
            params.fps,
            params.resolution.label(),
            params.end_zoom,
            params.beats.len(),
            self.store.len()
        );

        let child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let failure = JobFailure::Launch {
                    program: command.program.display().to_string(),
                    source,
                };
                log::warn!("Job {} failed: {}", id, failure);
                self.store
                    .update_if_exists(&id, |job| job.fail(failure.to_string()));
                return Ok(id);
            }
        };
        log::debug!("Job {}: {} {:?}", id, command.program.display(), command.args);

        let (stop_tx, stop_rx) = oneshot::channel();
        let ramp = tokio::spawn(ramp_progress(
            Arc::clone(&self.store),
            id.clone(),
            self.tick_interval,
            stop_rx,
        ));
        tokio::spawn(supervise(
            Arc::clone(&self.store),
            id.clone(),
            child,
            command.output,
            stop_tx,
            ramp,
        ));

        Ok(id)
    }

    /// Current record, or a `queued` placeholder for ids not in the table.
    pub fn status(&self, id: &JobId) -> Job {
        self.store
            .get(id)
            .unwrap_or_else(|| Job::queued(id.clone()))
    }
}

async fn create_dir(path: &Path) -> Result<(), RenderError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| RenderError::Workspace {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_asset(path: &Path, data: &[u8]) -> Result<(), RenderError> {
    tokio::fs::write(path, data)
        .await
        .map_err(|source| RenderError::Workspace {
            path: path.to_path_buf(),
            source,
        })
}

/// File name component only; falls back to `default` for empty names and
/// for names that would collide with the output file.
fn scratch_name(name: &str, default: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n.as_str() != OUTPUT_FILE)
        .unwrap_or_else(|| default.to_string())
}

async fn ramp_progress(
    store: Arc<JobStore>,
    id: JobId,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticks = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticks.tick() => {
                if !store.update_if_exists(&id, Job::advance).unwrap_or(false) {
                    break;
                }
            }
        }
    }
}

async fn supervise(
    store: Arc<JobStore>,
    id: JobId,
    child: Child,
    output: PathBuf,
    stop_ramp: oneshot::Sender<()>,
    ramp: JoinHandle<()>,
) {
    let result = child.wait_with_output().await;

    // stop-then-write: the ramp must be gone before the terminal state lands
    let _ = stop_ramp.send(());
    if let Err(err) = ramp.await {
        log::warn!("Job {}: progress task ended abnormally: {}", id, err);
    }

    let outcome = match result {
        Ok(out) => {
            let diagnostics = diagnostic_tail(&out.stderr);
            if !out.status.success() {
                Err(JobFailure::Exit {
                    code: out.status.code(),
                    diagnostics,
                })
            } else if !is_file(&output).await {
                Err(JobFailure::MissingOutput { diagnostics })
            } else {
                Ok(())
            }
        }
        Err(err) => Err(JobFailure::Wait(err)),
    };

    match outcome {
        Ok(()) => {
            log::info!("Job {} completed: {}", id, output.display());
            store.update_if_exists(&id, |job| job.complete(output.display().to_string()));
        }
        Err(failure) => {
            log::warn!("Job {} failed: {}", id, failure);
            store.update_if_exists(&id, |job| job.fail(failure.to_string()));
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
