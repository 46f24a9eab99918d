// src/handlers/generation.rs
//! Upload, job view, retry and live progress endpoints for the generation
//! workflow.

use axum::{
    extract::{
        multipart::Multipart,
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Extension,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt, Sink};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::AppError;
use crate::jobs::generation::NOT_AUDIO_MESSAGE;
use crate::jobs::progress::{retry_label_for, step_views};
use crate::jobs::{JobSnapshot, ProgressUpdate, RetryTicket};
use crate::models::dashboard::{JobViewResponse, RetryResponse, UploadAcceptedResponse};
use crate::models::file::AudioFile;
use crate::AppState;

const MAX_AUDIO_BYTES: usize = 100 * 1024 * 1024;

/// Reads the `file` field of the upload form.
async fn read_audio_field(mut multipart: Multipart) -> Result<AudioFile, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to parse multipart field: {}", e);
        AppError::InvalidRequest(format!("Malformed upload: {}", e))
    })? {
        if field.name() != Some("file") {
            tracing::debug!("Skipping field {:?}", field.name());
            continue;
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read bytes for '{}': {}", name, e);
            AppError::InvalidRequest(format!("Malformed upload: {}", e))
        })?;
        return Ok(AudioFile::new(name, content_type, data.to_vec()));
    }
    Err(AppError::InvalidRequest(NOT_AUDIO_MESSAGE.to_string()))
}

/// POST /api/generation/upload - accept audio and run the job in the background
pub async fn upload_audio(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let audio = read_audio_field(multipart).await?;
    let ticket = state.generation.begin_upload(audio)?;
    let file_id = ticket.file_id.clone();

    let controller = state.generation.clone();
    tokio::spawn(async move {
        let outcome = controller.run_upload(ticket).await;
        tracing::debug!("Generation run finished: {:?}", outcome);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadAcceptedResponse {
            success: true,
            file_id,
            message: "Upload started".to_string(),
        }),
    ))
}

/// GET /api/generation - current job with per-step status
pub async fn get_job(Extension(state): Extension<Arc<AppState>>) -> Json<JobViewResponse> {
    let job = state.generation.snapshot();
    Json(JobViewResponse {
        is_processing: job.step.is_processing(),
        steps: step_views(&job),
        retry_label: retry_label_for(&job),
        job,
    })
}

/// POST /api/generation/retry - resume a failed job
pub async fn retry_job(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state.generation.begin_retry()?;
    let action = ticket.action().to_string();

    let (status, message) = match &ticket {
        RetryTicket::Resume { file_id, .. } => (StatusCode::ACCEPTED, format!("Retrying video creation for {}", file_id)),
        RetryTicket::Reselect => (StatusCode::OK, "Please upload the file again".to_string()),
        RetryTicket::Noop => (StatusCode::OK, "Nothing to retry".to_string()),
    };

    if matches!(ticket, RetryTicket::Resume { .. }) {
        let controller = state.generation.clone();
        tokio::spawn(async move {
            let outcome = controller.run_retry(ticket).await;
            tracing::debug!("Retry run finished: {:?}", outcome);
        });
    }

    Ok((
        status,
        Json(RetryResponse {
            success: true,
            action,
            message,
        }),
    ))
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum WebSocketMessage<'a> {
    /// Sent once on connect.
    #[serde(rename = "snapshot")]
    Snapshot(&'a JobSnapshot),
    #[serde(rename = "progress")]
    Progress(&'a ProgressUpdate),
}

/// GET /api/generation/ws - live job progress
pub async fn progress_socket(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| progress_session(socket, state))
}

async fn progress_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    // subscribe before the snapshot so no change falls between them
    let updates = state.generation.subscribe();

    let snapshot = state.generation.snapshot();
    match serde_json::to_string(&WebSocketMessage::Snapshot(&snapshot)) {
        Ok(text) => {
            if sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        Err(e) => tracing::error!("Failed to encode job snapshot: {}", e),
    }
    tracing::info!("🔌 Progress socket opened");

    let mut forward = tokio::spawn(forward_progress(updates, sender));
    loop {
        tokio::select! {
            sent = &mut forward => {
                tracing::debug!("Progress forwarding ended: {:?}", sent);
                break;
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        forward.abort();
                        break;
                    }
                    // clients have nothing to say on this socket
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    tracing::info!("🔌 Progress socket closed");
}

/// Sends each job update as a JSON text frame until the job channel closes or
/// the client goes away. Returns the number of frames sent.
pub(crate) async fn forward_progress<S>(mut updates: broadcast::Receiver<ProgressUpdate>, mut sink: S) -> usize
where
    S: Sink<Message> + Unpin,
{
    let mut sent = 0;
    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("⚠️ Progress socket fell behind, {} updates skipped", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let text = match serde_json::to_string(&WebSocketMessage::Progress(&update)) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode progress update: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
        sent += 1;
    }
    sent
}

pub fn generation_routes() -> Router {
    Router::new()
        .route("/api/generation", get(get_job))
        .route("/api/generation/ws", get(progress_socket))
        .route("/api/generation/retry", post(retry_job))
        .route(
            "/api/generation/upload",
            post(upload_audio).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
}
