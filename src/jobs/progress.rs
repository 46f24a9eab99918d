// src/jobs/progress.rs
//! Per-step display state for the generation progress panel.

use serde::Serialize;

use super::{GenerationStep, JobSnapshot};

/// Steps shown in the panel, in order.
pub const DISPLAY_STEPS: [(GenerationStep, &str); 4] = [
    (GenerationStep::UploadingAudio, "Uploading audio"),
    (GenerationStep::CreatingPlaceholder, "Creating video"),
    (GenerationStep::Processing, "Processing animation"),
    (GenerationStep::UpdatingStatus, "Finalizing"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub key: GenerationStep,
    pub label: &'static str,
    pub status: StepStatus,
}

/// The step the panel highlights: the failed stage while an error is shown.
fn focus_step(job: &JobSnapshot) -> GenerationStep {
    match (&job.error, job.failed_step) {
        (Some(_), Some(step)) => step,
        _ => job.step,
    }
}

pub fn step_views(job: &JobSnapshot) -> Vec<StepView> {
    let focus = focus_step(job);
    let current = DISPLAY_STEPS.iter().position(|(step, _)| *step == focus);

    DISPLAY_STEPS
        .iter()
        .enumerate()
        .map(|(index, (step, label))| {
            let status = match current {
                Some(c) if job.error.is_some() && index == c => StepStatus::Error,
                Some(c) if index < c => StepStatus::Completed,
                Some(c) if index == c => StepStatus::Active,
                // completed finishes every displayed step
                None if job.step == GenerationStep::Completed => StepStatus::Completed,
                _ => StepStatus::Pending,
            };
            StepView {
                key: *step,
                label,
                status,
            }
        })
        .collect()
}

pub fn retry_label(step: GenerationStep) -> &'static str {
    match step {
        GenerationStep::UploadingAudio => "Retry audio upload",
        GenerationStep::CreatingPlaceholder => "Retry video creation",
        GenerationStep::Processing => "Retry processing",
        GenerationStep::UpdatingStatus => "Retry status update",
        _ => "Retry",
    }
}

/// Label for the retry button, present only while an error is shown.
pub fn retry_label_for(job: &JobSnapshot) -> Option<String> {
    job.error.as_ref().map(|_| retry_label(focus_step(job)).to_string())
}
