// src/handlers/mod.rs
pub mod gallery;
pub mod generation;
pub mod system;

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::ws::Message,
        http::{header, Request, StatusCode},
        Router,
    };
    use futures::StreamExt;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    use super::gallery::PLACEHOLDER_HEADER;
    use super::generation::forward_progress;

    use crate::assets::{minimal_mp4, StaticAssetLoader};
    use crate::config::AppConfig;
    use crate::identity::StaticIdentity;
    use crate::jobs::{GenerationStep, JobState, ProgressUpdate};
    use crate::models::file::Principal;
    use crate::store::InMemoryFileStore;
    use crate::{build_router, AppState};

    fn app(principal: Option<&str>) -> Router {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let state = AppState::new(
            config,
            Arc::new(InMemoryFileStore::new()),
            Arc::new(StaticIdentity::new(principal.map(Principal::new))),
            Arc::new(StaticAssetLoader::new("placeholder", minimal_mp4(2048))),
        );
        build_router(Arc::new(state))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    fn upload(file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "autotoon-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/generation/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_status_is_public_and_api_needs_identity() {
        let app = app(None);

        let (status, body) = json(&app, get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signed_in"], false);
        assert_eq!(body["store"], "in-memory");
        assert_eq!(body["generation_step"], "idle");

        let (status, body) = json(&app, get("/api/videos")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Unauthorized: Please log in to continue");
    }

    #[tokio::test]
    async fn test_me_reports_role() {
        let app = app(Some("alice-principal"));
        let (status, body) = json(&app, get("/api/me")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["principal"], "alice-principal");
        assert_eq!(body["role"], "admin");
        assert_eq!(body["is_admin"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_runs_job_and_fills_gallery() {
        let app = app(Some("alice-principal"));

        let (status, body) = json(&app, upload("story.mp3", "audio/mpeg", &[9u8; 4000])).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let file_id = body["file_id"].as_str().unwrap().to_string();

        // a second upload while the first runs is refused
        let (status, _) = json(&app, upload("again.mp3", "audio/mpeg", &[9u8; 10])).await;
        assert_eq!(status, StatusCode::CONFLICT);

        tokio::time::sleep(Duration::from_millis(3500)).await;

        let (_, job) = json(&app, get("/api/generation")).await;
        assert_eq!(job["job"]["step"], "completed");
        assert_eq!(job["is_processing"], false);
        assert_eq!(job["retry_label"], Value::Null);

        let (status, gallery) = json(&app, get("/api/videos")).await;
        assert_eq!(status, StatusCode::OK);
        let videos = gallery["videos"].as_array().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0]["file_id"], format!("video-{}", file_id));
        assert_eq!(videos[0]["status"], "completed");
        assert_eq!(gallery["refetch_after_ms"], Value::Null);

        let (_, toasts) = json(&app, get("/api/notifications")).await;
        let messages: Vec<&str> = toasts
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n["message"].as_str())
            .collect();
        assert!(messages.contains(&"Audio uploaded successfully!"));
        assert!(messages.contains(&"Video created successfully!"));

        let response = app
            .clone()
            .oneshot(get(&format!("/api/videos/video-{}/download", file_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"autotoon-"));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(response.headers()[PLACEHOLDER_HEADER], "false");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), 2048);
    }

    #[tokio::test]
    async fn test_non_audio_upload_rejected() {
        let app = app(Some("alice-principal"));
        let (status, body) = json(&app, upload("notes.txt", "text/plain", b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please upload an audio file");
    }

    #[tokio::test]
    async fn test_retry_without_failed_job_is_noop() {
        let app = app(Some("alice-principal"));
        let (status, body) = json(&app, post("/api/generation/retry")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "noop");
    }

    #[tokio::test]
    async fn test_gallery_retry_requires_failed_video() {
        let app = app(Some("alice-principal"));
        let (status, body) = json(&app, post("/api/videos/video-missing/retry")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "File not found");
    }

    #[tokio::test]
    async fn test_progress_socket_needs_identity() {
        let app = app(None);
        let (status, _) = json(&app, get("/api/generation/ws")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_progress_updates_forwarded_as_json_frames() {
        let (tx, rx) = broadcast::channel(8);
        let (sink, mut frames) = futures::channel::mpsc::unbounded::<Message>();

        let processing = JobState {
            step: GenerationStep::Processing,
            progress: 40,
            ..Default::default()
        };
        tx.send(ProgressUpdate::from_state(&processing)).unwrap();
        tx.send(ProgressUpdate::from_state(&JobState::default())).unwrap();
        drop(tx);

        assert_eq!(forward_progress(rx, sink).await, 2);

        let mut decoded = Vec::new();
        while let Some(frame) = frames.next().await {
            match frame {
                Message::Text(text) => decoded.push(serde_json::from_str::<Value>(&text).unwrap()),
                other => panic!("unexpected frame: {:?}", other),
            }
        }
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0]["type"], "progress");
        assert_eq!(decoded[0]["step"], "processing");
        assert_eq!(decoded[0]["progress"], 40);
        assert_eq!(decoded[1]["step"], "idle");
    }
}
