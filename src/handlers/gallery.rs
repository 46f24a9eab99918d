// src/handlers/gallery.rs
use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Set on video responses; `true` when the placeholder stood in for stored bytes.
pub const PLACEHOLDER_HEADER: &str = "x-placeholder-video";

use crate::error::AppError;
use crate::models::dashboard::{GalleryResponse, RetryResponse};
use crate::models::file::{FileRecord, Principal};
use crate::services::VideoPayload;
use crate::AppState;

/// GET /api/videos - the caller's video cards
pub async fn list_videos(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
) -> Result<Json<GalleryResponse>, AppError> {
    let files = state.gallery.list_videos(&caller).await?;
    Ok(Json(GalleryResponse {
        videos: state.gallery.cards(&files),
        refetch_after_ms: state
            .gallery
            .refetch_interval(&files)
            .map(|d| d.as_millis() as u64),
    }))
}

/// GET /api/videos/:file_id
pub async fn get_video(
    Path(file_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(state.gallery.get_file(&caller, &file_id).await?))
}

/// POST /api/videos/:file_id/retry - regenerate a failed video in the background
pub async fn retry_video(
    Path(file_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
) -> Result<impl IntoResponse, AppError> {
    let guard = state.gallery.begin_video_retry(&caller, &file_id).await?;

    let gallery = state.gallery.clone();
    tokio::spawn(async move {
        // outcome is reported through notifications
        let _ = gallery.run_video_retry(&caller, guard).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RetryResponse {
            success: true,
            action: "regenerating".to_string(),
            message: "Regenerating video...".to_string(),
        }),
    ))
}

fn video_response(payload: VideoPayload, disposition: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, payload.content_type.to_string()),
            (header::CONTENT_LENGTH, payload.bytes.len().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        [(PLACEHOLDER_HEADER, payload.from_placeholder.to_string())],
        payload.bytes,
    )
        .into_response()
}

/// GET /api/videos/:file_id/stream
pub async fn stream_video(
    Path(file_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
) -> Result<Response, AppError> {
    let payload = state.gallery.load_video(&caller, &file_id).await?;
    Ok(video_response(payload, "inline".to_string()))
}

/// GET /api/videos/:file_id/download
pub async fn download_video(
    Path(file_id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
) -> Result<Response, AppError> {
    let payload = state.gallery.load_video(&caller, &file_id).await?;
    tracing::info!("⬇️ Download of {} started ({} bytes)", file_id, payload.bytes.len());
    let disposition = format!("attachment; filename=\"{}\"", payload.file_name);
    Ok(video_response(payload, disposition))
}

pub fn gallery_routes() -> Router {
    Router::new()
        .route("/api/videos", get(list_videos))
        .route("/api/videos/:file_id", get(get_video))
        .route("/api/videos/:file_id/retry", post(retry_video))
        .route("/api/videos/:file_id/stream", get(stream_video))
        .route("/api/videos/:file_id/download", get(download_video))
}
