// src/jobs/mod.rs
//! Generation job state: the step machine, the retry memory and the progress
//! updates published to observers.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod generation;
pub mod progress;

pub use generation::{GenerationController, GenerationTimings, RetryTicket, StageOutcome, UploadTicket};

/// Current stage of the generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStep {
    #[default]
    Idle,
    UploadingAudio,
    CreatingPlaceholder,
    Processing,
    UpdatingStatus,
    Completed,
}

impl GenerationStep {
    /// True while a stage is running; idle and completed accept new uploads.
    pub fn is_processing(&self) -> bool {
        !matches!(self, GenerationStep::Idle | GenerationStep::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStep::Idle => "idle",
            GenerationStep::UploadingAudio => "uploading-audio",
            GenerationStep::CreatingPlaceholder => "creating-placeholder",
            GenerationStep::Processing => "processing",
            GenerationStep::UpdatingStatus => "updating-status",
            GenerationStep::Completed => "completed",
        }
    }
}

/// Reference to audio the store already holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioRef {
    pub file_id: String,
    pub size_bytes: u64,
}

/// What a retry needs to know about the last attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryRecord {
    pub file_id: String,
    pub audio: Option<AudioRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Noop,
    /// Audio is already in the store; go straight to the placeholder stage.
    ResumeFromPlaceholder { file_id: String },
    /// Audio never made it; the user has to pick the file again.
    Reselect,
}

pub fn decide_retry(record: Option<&RetryRecord>) -> RetryDecision {
    match record {
        None => RetryDecision::Noop,
        Some(RetryRecord { audio: Some(_), file_id }) => RetryDecision::ResumeFromPlaceholder {
            file_id: file_id.clone(),
        },
        Some(RetryRecord { audio: None, .. }) => RetryDecision::Reselect,
    }
}

/// Mutable job state owned by the controller.
#[derive(Debug, Clone, Default)]
pub struct JobState {
    pub step: GenerationStep,
    pub progress: u8,
    pub error: Option<String>,
    /// Stage that produced `error`; `step` itself is back at idle by then.
    pub failed_step: Option<GenerationStep>,
    pub retry: Option<RetryRecord>,
}

impl JobState {
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            file_id: self.retry.as_ref().map(|r| r.file_id.clone()),
            step: self.step,
            progress: self.progress,
            error: self.error.clone(),
            failed_step: self.failed_step,
            audio_retained: self.retry.as_ref().map(|r| r.audio.is_some()).unwrap_or(false),
        }
    }
}

/// Read-only view of the job served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub file_id: Option<String>,
    pub step: GenerationStep,
    pub progress: u8,
    pub error: Option<String>,
    pub failed_step: Option<GenerationStep>,
    pub audio_retained: bool,
}

/// Published on every job change.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub file_id: Option<String>,
    pub step: GenerationStep,
    pub progress: u8,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn from_state(state: &JobState) -> Self {
        Self {
            file_id: state.retry.as_ref().map(|r| r.file_id.clone()),
            step: state.step,
            progress: state.progress,
            error: state.error.clone(),
            timestamp: Utc::now(),
        }
    }
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<unix-millis>-<6 base36 chars>`, unique enough for one user's uploads.
pub fn new_file_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Id of the video record derived from an audio upload.
pub fn video_file_id(file_id: &str) -> String {
    format!("video-{}", file_id)
}
