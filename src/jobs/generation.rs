// src/jobs/generation.rs
//! The generation workflow: audio upload, placeholder video creation,
//! simulated processing and status finalization, with stage-aware retry.
//!
//! Each operation is split in two. `begin_*` checks preconditions and moves
//! the job out of idle under the state lock, so a second caller sees
//! `JobInFlight`. `run_*` performs the stages and is what the HTTP layer
//! spawns. `start_upload` and `retry` run both halves inline.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

use super::{
    decide_retry, new_file_id, video_file_id, AudioRef, GenerationStep, JobSnapshot, JobState,
    ProgressUpdate, RetryDecision, RetryRecord,
};
use crate::assets::SharedAssetLoader;
use crate::error::{describe_video_failure, normalize_error, AppError};
use crate::identity::IdentityProvider;
use crate::models::file::{AudioFile, FileStatus, FileType, Principal};
use crate::notify::SharedNotifier;
use crate::store::{ProgressFn, SharedFileStore};

pub const STORE_INITIALIZING_TOAST: &str = "System is initializing. Please wait a moment.";
pub const NOT_AUDIO_MESSAGE: &str = "Please upload an audio file";

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Fixed delays standing in for real completion signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTimings {
    /// Hold in the processing step.
    pub processing: Duration,
    /// How long `completed` stays visible before the job resets.
    pub completion_reset: Duration,
    /// Hold while the gallery regenerates a failed video.
    pub gallery_retry: Duration,
    /// Gallery refresh interval while anything is processing.
    pub gallery_refetch: Duration,
}

impl Default for GenerationTimings {
    fn default() -> Self {
        Self {
            processing: Duration::from_secs(3),
            completion_reset: Duration::from_secs(2),
            gallery_retry: Duration::from_secs(5),
            gallery_refetch: Duration::from_secs(3),
        }
    }
}

/// How a stage run ended. Failures are already recorded on the job.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Completed { file_id: String },
    Failed { step: GenerationStep, message: String },
    /// The retry had nothing to resume.
    Skipped,
}

/// An accepted upload, ready to run.
#[derive(Debug)]
pub struct UploadTicket {
    pub caller: Principal,
    pub file_id: String,
    pub audio: AudioFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryTicket {
    Noop,
    /// The user was asked to select the file again and the job was cleared.
    Reselect,
    Resume { caller: Principal, file_id: String },
}

impl RetryTicket {
    pub fn action(&self) -> &'static str {
        match self {
            RetryTicket::Noop => "noop",
            RetryTicket::Reselect => "reselect",
            RetryTicket::Resume { .. } => "resumed",
        }
    }
}

/// Job state plus the channel its changes are published on. Cloned into the
/// progress callbacks and the delayed reset task.
#[derive(Clone)]
struct JobCell {
    state: Arc<RwLock<JobState>>,
    updates: broadcast::Sender<ProgressUpdate>,
}

impl JobCell {
    fn new() -> Self {
        let (updates, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(JobState::default())),
            updates,
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        self.state.read().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    /// Applies `f` under the write lock and publishes the new state if it
    /// succeeded. The lock is released before publishing.
    fn transition<R, E>(&self, f: impl FnOnce(&mut JobState) -> Result<R, E>) -> Result<R, E> {
        let (result, update) = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            let result = f(&mut state)?;
            (result, ProgressUpdate::from_state(&state))
        };
        // no subscribers is fine
        let _ = self.updates.send(update);
        Ok(result)
    }

    fn update(&self, f: impl FnOnce(&mut JobState)) {
        let _ = self.transition::<(), ()>(|state| {
            f(state);
            Ok(())
        });
    }

    fn enter(&self, step: GenerationStep) {
        self.update(|state| {
            state.step = step;
            state.progress = 0;
        });
    }

    /// Records a stage failure against the step that was running.
    fn fail(&self, message: &str) -> GenerationStep {
        self.transition::<_, ()>(|state| {
            let failed = state.step;
            state.failed_step = Some(failed);
            state.step = GenerationStep::Idle;
            state.error = Some(message.to_string());
            Ok(failed)
        })
        .unwrap_or(GenerationStep::Idle)
    }
}

pub struct GenerationController {
    store: SharedFileStore,
    identity: Arc<dyn IdentityProvider>,
    assets: SharedAssetLoader,
    notifier: SharedNotifier,
    timings: GenerationTimings,
    job: JobCell,
}

impl GenerationController {
    pub fn new(
        store: SharedFileStore,
        identity: Arc<dyn IdentityProvider>,
        assets: SharedAssetLoader,
        notifier: SharedNotifier,
        timings: GenerationTimings,
    ) -> Self {
        Self {
            store,
            identity,
            assets,
            notifier,
            timings,
            job: JobCell::new(),
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.job.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.job.updates.subscribe()
    }

    pub fn timings(&self) -> GenerationTimings {
        self.timings
    }

    /// Starts a fresh job for `audio`, discarding any failed one.
    pub fn begin_upload(&self, audio: AudioFile) -> Result<UploadTicket, AppError> {
        let caller = self
            .identity
            .current()
            .ok_or_else(|| AppError::Unauthorized("no signed-in caller".to_string()))?;

        if !self.store.is_ready() {
            self.notifier.error(STORE_INITIALIZING_TOAST);
            return Err(AppError::NotReady);
        }

        if !audio.looks_like_audio() {
            self.notifier.error(NOT_AUDIO_MESSAGE);
            return Err(AppError::InvalidRequest(NOT_AUDIO_MESSAGE.to_string()));
        }

        let file_id = new_file_id();
        self.job.transition(|state| {
            if state.step.is_processing() {
                return Err(AppError::JobInFlight);
            }
            *state = JobState {
                step: GenerationStep::UploadingAudio,
                progress: 0,
                error: None,
                failed_step: None,
                retry: Some(RetryRecord {
                    file_id: file_id.clone(),
                    audio: None,
                }),
            };
            Ok(())
        })?;

        tracing::info!("🎬 Generation job {} started by {} ({})", file_id, caller, audio.name);
        Ok(UploadTicket {
            caller,
            file_id,
            audio,
        })
    }

    pub async fn run_upload(&self, ticket: UploadTicket) -> StageOutcome {
        let UploadTicket {
            caller,
            file_id,
            audio,
        } = ticket;
        let size_bytes = audio.bytes.len() as u64;

        tracing::info!("🎵 Uploading audio {} ({} bytes)", file_id, size_bytes);
        let uploaded = self
            .store
            .upload_file(&caller, &file_id, FileType::Audio, audio.bytes, Some(self.progress_sink()))
            .await;

        if let Err(err) = uploaded {
            let message = normalize_error(&err);
            tracing::warn!("❌ Audio upload failed for {}: {}", file_id, err);
            let step = self.job.fail(&message);
            self.notifier.error(&message);
            return StageOutcome::Failed { step, message };
        }

        self.job.update(|state| {
            if let Some(record) = state.retry.as_mut().filter(|r| r.file_id == file_id) {
                record.audio = Some(AudioRef {
                    file_id: file_id.clone(),
                    size_bytes,
                });
            }
        });
        tracing::info!("✅ Audio {} uploaded", file_id);
        self.notifier.success("Audio uploaded successfully!");

        self.run_video_stage(&caller, &file_id).await
    }

    /// Validates input, then runs the whole job.
    pub async fn start_upload(&self, audio: AudioFile) -> Result<StageOutcome, AppError> {
        let ticket = self.begin_upload(audio)?;
        Ok(self.run_upload(ticket).await)
    }

    /// Placeholder creation through completion. Also the retry entry point.
    pub async fn run_video_stage(&self, caller: &Principal, file_id: &str) -> StageOutcome {
        match self.create_video(caller, file_id).await {
            Ok(()) => {
                self.job.update(|state| {
                    state.step = GenerationStep::Completed;
                    state.progress = 100;
                });
                tracing::info!("🎉 Video {} created", video_file_id(file_id));
                self.notifier.success("Video created successfully!");
                self.schedule_reset(file_id);
                StageOutcome::Completed {
                    file_id: file_id.to_string(),
                }
            }
            Err(err) => {
                let message = describe_video_failure(&err);
                tracing::error!("❌ Video creation failed for {}: {}", file_id, err);
                let step = self.job.fail(&message);
                self.notifier.error(&message);
                if matches!(step, GenerationStep::Processing | GenerationStep::UpdatingStatus) {
                    self.mark_video_failed(caller, file_id).await;
                }
                StageOutcome::Failed { step, message }
            }
        }
    }

    /// The video record exists once processing starts. Leave it `failed`
    /// rather than `processing` so the gallery can retry it even after this
    /// job is replaced.
    async fn mark_video_failed(&self, caller: &Principal, file_id: &str) {
        let video_id = video_file_id(file_id);
        if let Err(e) = self
            .store
            .update_file_status(caller, &video_id, FileStatus::Failed)
            .await
        {
            tracing::error!("Could not mark video {} as failed: {}", video_id, e);
        }
    }

    async fn create_video(&self, caller: &Principal, file_id: &str) -> Result<(), AppError> {
        self.job.update(|state| {
            state.step = GenerationStep::CreatingPlaceholder;
            state.progress = 0;
            state.error = None;
            state.failed_step = None;
        });

        // validated before anything is sent to the store
        let placeholder = self.assets.load_placeholder().await?;
        tracing::info!("📼 Creating video with {} bytes", placeholder.len());

        let video_id = video_file_id(file_id);
        match self
            .store
            .upload_file(caller, &video_id, FileType::Video, placeholder, Some(self.progress_sink()))
            .await
        {
            Ok(()) => {}
            // a previous attempt got this far
            Err(AppError::AlreadyExists(_)) => {
                tracing::info!("♻️ Video {} already uploaded, reusing it", video_id);
                self.store
                    .update_file_status(caller, &video_id, FileStatus::Processing)
                    .await?;
            }
            Err(err) => return Err(err),
        }

        self.job.enter(GenerationStep::Processing);
        tokio::time::sleep(self.timings.processing).await;

        self.job.enter(GenerationStep::UpdatingStatus);
        self.store
            .update_file_status(caller, &video_id, FileStatus::Completed)
            .await
    }

    /// Clears the job once `completed` has been shown, unless a newer job
    /// replaced it meanwhile.
    fn schedule_reset(&self, file_id: &str) {
        let job = self.job.clone();
        let delay = self.timings.completion_reset;
        let file_id = file_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reset = job.transition(|state| {
                let same_job = state.retry.as_ref().map(|r| r.file_id == file_id).unwrap_or(false);
                if state.step == GenerationStep::Completed && same_job {
                    *state = JobState::default();
                    Ok(())
                } else {
                    Err(())
                }
            });
            if reset.is_ok() {
                tracing::debug!("🔄 Job {} reset to idle", file_id);
            }
        });
    }

    pub fn begin_retry(&self) -> Result<RetryTicket, AppError> {
        let caller = self.identity.current();
        let ticket = self.job.transition(|state| {
            if state.step.is_processing() {
                return Err(AppError::JobInFlight);
            }
            // only a failed job has anything to retry
            if state.error.is_none() {
                return Ok(RetryTicket::Noop);
            }
            match decide_retry(state.retry.as_ref()) {
                RetryDecision::Noop => Ok(RetryTicket::Noop),
                RetryDecision::Reselect => {
                    *state = JobState::default();
                    Ok(RetryTicket::Reselect)
                }
                RetryDecision::ResumeFromPlaceholder { file_id } => {
                    let caller = caller
                        .clone()
                        .ok_or_else(|| AppError::Unauthorized("no signed-in caller".to_string()))?;
                    state.step = GenerationStep::CreatingPlaceholder;
                    state.progress = 0;
                    state.error = None;
                    state.failed_step = None;
                    Ok(RetryTicket::Resume { caller, file_id })
                }
            }
        })?;

        match &ticket {
            RetryTicket::Reselect => self.notifier.info("Please upload the file again"),
            RetryTicket::Resume { file_id, .. } => {
                tracing::info!("🔁 Retrying video creation for {}", file_id)
            }
            RetryTicket::Noop => tracing::debug!("Retry requested with nothing to retry"),
        }
        Ok(ticket)
    }

    pub async fn run_retry(&self, ticket: RetryTicket) -> StageOutcome {
        match ticket {
            RetryTicket::Resume { caller, file_id } => self.run_video_stage(&caller, &file_id).await,
            RetryTicket::Noop | RetryTicket::Reselect => StageOutcome::Skipped,
        }
    }

    pub async fn retry(&self) -> Result<StageOutcome, AppError> {
        let ticket = self.begin_retry()?;
        Ok(self.run_retry(ticket).await)
    }

    fn progress_sink(&self) -> ProgressFn {
        let job = self.job.clone();
        Arc::new(move |percent| job.update(|state| state.progress = percent.min(100)))
    }
}
