// src/services/gallery.rs
//! The caller's video gallery: cards, auto-refresh, per-file regeneration and
//! playback/download payloads.

use backoff::{future::retry, ExponentialBackoff};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::assets::{SharedAssetLoader, MIN_PLACEHOLDER_BYTES};
use crate::error::AppError;
use crate::jobs::GenerationTimings;
use crate::models::dashboard::VideoCard;
use crate::models::file::{FileRecord, FileStatus, FileType, Principal};
use crate::notify::SharedNotifier;
use crate::store::SharedFileStore;

pub const SPINNER_THUMBNAIL: &str = "/assets/generated/cartoon-loading-spinner.dim_100x100.png";
pub const GALLERY_THUMBNAIL: &str = "/assets/generated/cartoon-gallery-thumb.dim_1280x720.png";

/// Extra attempts for a file lookup, and the pause between them.
const FILE_QUERY_RETRIES: u32 = 2;
const FILE_QUERY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Last eight characters of an id, used in titles and download names.
pub fn short_id(file_id: &str) -> &str {
    let start = file_id
        .char_indices()
        .rev()
        .nth(7)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &file_id[start..]
}

pub fn download_name(file_id: &str) -> String {
    format!("autotoon-{}.mp4", short_id(file_id))
}

pub fn video_card(file: &FileRecord) -> VideoCard {
    let thumbnail = match file.status {
        FileStatus::Processing => Some(SPINNER_THUMBNAIL.to_string()),
        FileStatus::Completed => Some(GALLERY_THUMBNAIL.to_string()),
        FileStatus::Failed => None,
    };
    VideoCard {
        file_id: file.file_id.clone(),
        title: format!("Video {}", short_id(&file.file_id)),
        status: file.status,
        badge: file.status.badge().to_string(),
        uploaded_on: file.upload_time.format("%b %-d, %Y").to_string(),
        thumbnail,
        can_play: file.status == FileStatus::Completed,
        can_retry: file.status == FileStatus::Failed,
    }
}

/// Bytes ready to stream or download.
#[derive(Debug, Clone)]
pub struct VideoPayload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// True when the store's bytes were unavailable and the placeholder was served.
    pub from_placeholder: bool,
}

/// Removes the file id from the in-flight set when the retry ends, however
/// it ends.
#[derive(Debug)]
pub struct VideoRetryGuard {
    file_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl VideoRetryGuard {
    pub fn file_id(&self) -> &str {
        &self.file_id
    }
}

impl Drop for VideoRetryGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.file_id);
    }
}

pub struct GalleryService {
    store: SharedFileStore,
    assets: SharedAssetLoader,
    notifier: SharedNotifier,
    timings: GenerationTimings,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl GalleryService {
    pub fn new(
        store: SharedFileStore,
        assets: SharedAssetLoader,
        notifier: SharedNotifier,
        timings: GenerationTimings,
    ) -> Self {
        Self {
            store,
            assets,
            notifier,
            timings,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The caller's videos, newest first.
    pub async fn list_videos(&self, caller: &Principal) -> Result<Vec<FileRecord>, AppError> {
        let mut videos: Vec<FileRecord> = self
            .store
            .get_user_files(caller, caller)
            .await?
            .into_iter()
            .filter(|f| f.file_type == FileType::Video)
            .collect();
        videos.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        Ok(videos)
    }

    pub fn cards(&self, files: &[FileRecord]) -> Vec<VideoCard> {
        files.iter().map(video_card).collect()
    }

    /// Poll interval while anything is still processing.
    pub fn refetch_interval(&self, files: &[FileRecord]) -> Option<Duration> {
        files
            .iter()
            .any(|f| f.status == FileStatus::Processing)
            .then_some(self.timings.gallery_refetch)
    }

    /// Looks a file up, retrying transient failures twice, one second apart.
    pub async fn get_file(&self, caller: &Principal, file_id: &str) -> Result<FileRecord, AppError> {
        let backoff_config = ExponentialBackoff {
            current_interval: FILE_QUERY_RETRY_DELAY,
            initial_interval: FILE_QUERY_RETRY_DELAY,
            max_interval: FILE_QUERY_RETRY_DELAY,
            multiplier: 1.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        let attempts = &AtomicU32::new(0);
        let store = &self.store;

        retry(backoff_config, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            match store.get_file(caller, file_id).await {
                Ok(file) => Ok(file),
                Err(e @ (AppError::NotFound(_) | AppError::Unauthorized(_))) => {
                    Err(backoff::Error::permanent(e))
                }
                Err(e) if attempt >= FILE_QUERY_RETRIES => Err(backoff::Error::permanent(e)),
                Err(e) => {
                    warn!("File lookup for {} failed (retrying): {}", file_id, e);
                    Err(backoff::Error::transient(e))
                }
            }
        })
        .await
    }

    /// Claims the retry slot for a failed video. Only one retry per file id
    /// runs at a time. The slot is taken before the status is read, so a
    /// retry that just finished cannot be started twice.
    pub async fn begin_video_retry(&self, caller: &Principal, file_id: &str) -> Result<VideoRetryGuard, AppError> {
        let guard = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if !in_flight.insert(file_id.to_string()) {
                return Err(AppError::JobInFlight);
            }
            VideoRetryGuard {
                file_id: file_id.to_string(),
                in_flight: self.in_flight.clone(),
            }
        };

        // dropping the guard on any early return frees the slot
        let file = self.store.get_file(caller, file_id).await?;
        if file.status != FileStatus::Failed {
            return Err(AppError::InvalidRequest(format!(
                "Only failed videos can be retried ({} is {})",
                file_id,
                file.status.badge().to_lowercase()
            )));
        }
        Ok(guard)
    }

    /// Regenerates the video. On any error the file ends up `failed`, never
    /// stuck in `processing`.
    pub async fn run_video_retry(&self, caller: &Principal, guard: VideoRetryGuard) -> Result<(), AppError> {
        let file_id = guard.file_id();
        let result = self.regenerate(caller, file_id).await;

        match &result {
            Ok(()) => {
                info!("🎉 Video {} regenerated", file_id);
                self.notifier.success("Video created successfully!");
            }
            Err(e) => {
                warn!("❌ Retry of video {} failed: {}", file_id, e);
                self.notifier.error("Retry failed");
                if let Err(mark_err) = self
                    .store
                    .update_file_status(caller, file_id, FileStatus::Failed)
                    .await
                {
                    error!("Could not mark video {} as failed: {}", file_id, mark_err);
                }
            }
        }
        result
    }

    async fn regenerate(&self, caller: &Principal, file_id: &str) -> Result<(), AppError> {
        self.store
            .update_file_status(caller, file_id, FileStatus::Processing)
            .await?;
        self.notifier.info("Regenerating video...");
        info!("🔁 Regenerating video {}", file_id);

        tokio::time::sleep(self.timings.gallery_retry).await;

        self.store
            .update_file_status(caller, file_id, FileStatus::Completed)
            .await
    }

    pub async fn retry_failed_video(&self, caller: &Principal, file_id: &str) -> Result<(), AppError> {
        let guard = self.begin_video_retry(caller, file_id).await?;
        self.run_video_retry(caller, guard).await
    }

    /// Bytes for playback or download. Falls back to the placeholder when the
    /// store cannot produce the payload.
    pub async fn load_video(&self, caller: &Principal, file_id: &str) -> Result<VideoPayload, AppError> {
        let file = self.get_file(caller, file_id).await?;

        let (bytes, from_placeholder) = match self.store.file_bytes(caller, &file.file_id).await {
            Ok(bytes) => (bytes, false),
            Err(e) => {
                warn!("Falling back to placeholder for {}: {}", file_id, e);
                (self.assets.fetch().await?, true)
            }
        };

        if bytes.len() < MIN_PLACEHOLDER_BYTES {
            return Err(AppError::InvalidAsset(format!(
                "Invalid video data: only {} bytes received. The video file may be corrupted.",
                bytes.len()
            )));
        }

        Ok(VideoPayload {
            file_name: download_name(&file.file_id),
            content_type: "video/mp4",
            bytes,
            from_placeholder,
        })
    }
}
