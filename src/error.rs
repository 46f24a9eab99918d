// src/error.rs
//! Error taxonomy shared by the store clients, the generation controller and
//! the HTTP layer, plus the normalization that turns errors into toast text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use crate::models::dashboard::ErrorResponse;

pub const INITIALIZING_MESSAGE: &str = "System is initializing. Please wait a moment and try again.";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// The File Store connection is not established yet.
    #[error("Actor not initialized")]
    NotReady,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File {0} already exists")]
    AlreadyExists(String),
    /// The placeholder payload failed size or signature validation.
    #[error("{0}")]
    InvalidAsset(String),
    /// A job (or a retry for the same file) is already running.
    #[error("A generation is already in progress")]
    JobInFlight,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Unknown(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) | AppError::JobInFlight => StatusCode::CONFLICT,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidAsset(_) | AppError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            AppError::NotReady
        } else {
            AppError::Unknown(err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Unknown(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = normalize_error(&self);
        if status.is_server_error() {
            tracing::error!("❌ Request failed ({}): {}", status, self);
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

/// Maps an error into the English sentence shown to the user.
pub fn normalize_error(err: &AppError) -> String {
    match err {
        AppError::NotReady => INITIALIZING_MESSAGE.to_string(),
        AppError::Unauthorized(_) => "Unauthorized: Please log in to continue".to_string(),
        AppError::NotFound(_) => "File not found".to_string(),
        AppError::AlreadyExists(_) => "File already exists".to_string(),
        AppError::InvalidAsset(message) => message.clone(),
        AppError::JobInFlight => err.to_string(),
        AppError::InvalidRequest(message) | AppError::Unknown(message) => normalize_message(message),
    }
}

/// Same mapping for raw messages coming back from a remote store.
pub fn normalize_message(message: &str) -> String {
    let message = message.trim();
    if message.is_empty() {
        return UNEXPECTED_MESSAGE.to_string();
    }
    if message.contains("Actor not initialized") {
        return INITIALIZING_MESSAGE.to_string();
    }
    if message.contains("Unauthorized") {
        return "Unauthorized: Please log in to continue".to_string();
    }
    if message.contains("File not found") {
        return "File not found".to_string();
    }
    if message.contains("already exists") {
        return "File already exists".to_string();
    }
    message.to_string()
}

/// Message stored on the job when a stage after the audio upload fails.
/// Asset-validation detail is kept verbatim so the user knows what to replace.
pub fn describe_video_failure(err: &AppError) -> String {
    let message = normalize_error(err);
    if matches!(err, AppError::InvalidAsset(_)) || message.contains("placeholder") || message.contains("MP4") {
        message
    } else {
        format!("Failed to create video: {}", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_variants() {
        assert_eq!(normalize_error(&AppError::NotReady), INITIALIZING_MESSAGE);
        assert_eq!(
            normalize_error(&AppError::Unauthorized("anonymous caller".into())),
            "Unauthorized: Please log in to continue"
        );
        assert_eq!(normalize_error(&AppError::NotFound("video-1".into())), "File not found");
        assert_eq!(normalize_error(&AppError::AlreadyExists("1-a".into())), "File already exists");
    }

    #[test]
    fn test_normalize_remote_messages() {
        assert_eq!(normalize_message("Actor not initialized"), INITIALIZING_MESSAGE);
        assert_eq!(normalize_message("Reject: File with id 12 already exists"), "File already exists");
        assert_eq!(normalize_message("   "), UNEXPECTED_MESSAGE);
        assert_eq!(normalize_message("Canister out of cycles"), "Canister out of cycles");
    }

    #[test]
    fn test_video_failure_wrapping() {
        let asset = AppError::InvalidAsset("Placeholder video asset is invalid (only 500 bytes).".into());
        assert_eq!(describe_video_failure(&asset), "Placeholder video asset is invalid (only 500 bytes).");

        let remote = AppError::Unknown("status update rejected".into());
        assert_eq!(describe_video_failure(&remote), "Failed to create video: status update rejected");

        assert_eq!(
            describe_video_failure(&AppError::NotReady),
            format!("Failed to create video: {}", INITIALIZING_MESSAGE)
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::JobInFlight.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotReady.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::InvalidRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
    }
}
