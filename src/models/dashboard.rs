// src/models/dashboard.rs
//! Response bodies for the dashboard API.

use serde::{Deserialize, Serialize};

use crate::jobs::progress::StepView;
use crate::jobs::{GenerationStep, JobSnapshot};
use crate::models::file::{FileStatus, Principal, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UploadAcceptedResponse {
    pub success: bool,
    pub file_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub success: bool,
    /// "resumed", "reselect" or "noop"
    pub action: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobViewResponse {
    pub job: JobSnapshot,
    pub is_processing: bool,
    pub steps: Vec<StepView>,
    pub retry_label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoCard {
    pub file_id: String,
    pub title: String,
    pub status: FileStatus,
    pub badge: String,
    pub uploaded_on: String,
    pub thumbnail: Option<String>,
    pub can_play: bool,
    pub can_retry: bool,
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub videos: Vec<VideoCard>,
    /// Present while any video is still processing.
    pub refetch_after_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CallerResponse {
    pub principal: Principal,
    pub role: UserRole,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatusResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub store_ready: bool,
    pub signed_in: bool,
    pub generation_step: GenerationStep,
}
