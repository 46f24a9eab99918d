// src/store/http.rs
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use futures::stream;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{chunk_progress, FileStore, ProgressFn, UPLOAD_CHUNK_SIZE};
use crate::error::{normalize_message, AppError};
use crate::models::file::{FileRecord, FileStatus, FileType, Principal, UserRole};

const CALLER_HEADER: &str = "x-caller-principal";

/// Client for a remote File Store speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFileStore {
    client: Client,
    base_url: String,
    ready: Arc<AtomicBool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusBody {
    status: FileStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct RoleBody {
    role: UserRole,
}

impl HttpFileStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.base_url, urlencoding::encode(file_id))
    }

    /// Probes `/health` until the store answers, then marks the client ready.
    /// Retries forever with exponential backoff; run it on a background task.
    pub async fn wait_until_ready(&self) {
        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let health_url = format!("{}/health", self.base_url);
        let operation = || async {
            let response = self
                .client
                .get(&health_url)
                .timeout(Duration::from_secs(5))
                .send()
                .await
                .map_err(|e| {
                    warn!("File store not reachable yet (retrying): {}", e);
                    backoff::Error::transient(e.to_string())
                })?;
            if response.status().is_success() {
                Ok(())
            } else {
                warn!("File store health check returned {} (retrying)", response.status());
                Err(backoff::Error::transient(format!("health check returned {}", response.status())))
            }
        };

        match retry(backoff_config, operation).await {
            Ok(()) => {
                self.ready.store(true, Ordering::SeqCst);
                info!("✅ File store at {} is ready", self.base_url);
            }
            Err(e) => warn!("File store health check gave up: {}", e),
        }
    }

    fn ensure_ready(&self) -> Result<(), AppError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(AppError::NotReady)
        }
    }

    async fn check(response: Response, subject: &str) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body, subject))
    }
}

/// Maps a failed store response into the error taxonomy.
fn error_for_status(status: StatusCode, body: &str, subject: &str) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(body.to_string()),
        StatusCode::NOT_FOUND => AppError::NotFound(subject.to_string()),
        StatusCode::CONFLICT => AppError::AlreadyExists(subject.to_string()),
        StatusCode::SERVICE_UNAVAILABLE => AppError::NotReady,
        _ => AppError::Unknown(format!("File store returned {}: {}", status, normalize_message(body))),
    }
}

#[async_trait]
impl FileStore for HttpFileStore {
    fn name(&self) -> &'static str {
        "http"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn upload_file(
        &self,
        caller: &Principal,
        file_id: &str,
        file_type: FileType,
        payload: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> Result<(), AppError> {
        self.ensure_ready()?;

        let total = payload.len();
        let percents = chunk_progress(total, UPLOAD_CHUNK_SIZE);
        let chunks: Vec<Vec<u8>> = if payload.is_empty() {
            vec![Vec::new()]
        } else {
            payload.chunks(UPLOAD_CHUNK_SIZE).map(|c| c.to_vec()).collect()
        };

        // Report a chunk's progress when the body stream hands it to the transport.
        let body_stream = stream::iter(chunks.into_iter().zip(percents).map(move |(chunk, percent)| {
            if let Some(progress) = &progress {
                progress(percent);
            }
            Ok::<Vec<u8>, std::io::Error>(chunk)
        }));

        let response = self
            .client
            .put(self.file_url(file_id))
            .query(&[("file_type", file_type.as_str())])
            .header(CALLER_HEADER, caller.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await?;
        Self::check(response, file_id).await?;

        info!("📤 Uploaded {} ({} bytes) to file store as {}", file_id, total, file_type.as_str());
        Ok(())
    }

    async fn update_file_status(
        &self,
        caller: &Principal,
        file_id: &str,
        status: FileStatus,
    ) -> Result<(), AppError> {
        self.ensure_ready()?;
        let response = self
            .client
            .put(format!("{}/status", self.file_url(file_id)))
            .header(CALLER_HEADER, caller.as_str())
            .json(&StatusBody { status })
            .send()
            .await?;
        Self::check(response, file_id).await?;
        Ok(())
    }

    async fn get_file(&self, caller: &Principal, file_id: &str) -> Result<FileRecord, AppError> {
        self.ensure_ready()?;
        let response = self
            .client
            .get(self.file_url(file_id))
            .header(CALLER_HEADER, caller.as_str())
            .send()
            .await?;
        Ok(Self::check(response, file_id).await?.json().await?)
    }

    async fn get_user_files(&self, caller: &Principal, user: &Principal) -> Result<Vec<FileRecord>, AppError> {
        self.ensure_ready()?;
        let response = self
            .client
            .get(format!("{}/users/{}/files", self.base_url, urlencoding::encode(user.as_str())))
            .header(CALLER_HEADER, caller.as_str())
            .send()
            .await?;
        Ok(Self::check(response, user.as_str()).await?.json().await?)
    }

    async fn file_bytes(&self, caller: &Principal, file_id: &str) -> Result<Vec<u8>, AppError> {
        self.ensure_ready()?;
        let response = self
            .client
            .get(format!("{}/content", self.file_url(file_id)))
            .header(CALLER_HEADER, caller.as_str())
            .send()
            .await?;
        Ok(Self::check(response, file_id).await?.bytes().await?.to_vec())
    }

    async fn get_caller_user_role(&self, caller: &Principal) -> Result<UserRole, AppError> {
        self.ensure_ready()?;
        let response = self
            .client
            .get(format!("{}/roles/caller", self.base_url))
            .header(CALLER_HEADER, caller.as_str())
            .send()
            .await?;
        let body: RoleBody = Self::check(response, caller.as_str()).await?.json().await?;
        Ok(body.role)
    }

    async fn assign_caller_user_role(
        &self,
        caller: &Principal,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), AppError> {
        self.ensure_ready()?;
        let response = self
            .client
            .put(format!("{}/roles/{}", self.base_url, urlencoding::encode(user.as_str())))
            .header(CALLER_HEADER, caller.as_str())
            .json(&RoleBody { role })
            .send()
            .await?;
        Self::check(response, user.as_str()).await?;
        Ok(())
    }
}
