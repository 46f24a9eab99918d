// src/middleware/logging.rs
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use crate::models::file::Principal;

/// Structured request log: one line in, one line out with status and latency.
/// Client errors log at warn, server errors at error.
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let matched_path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned());
    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %matched_path,
        user_agent = %user_agent,
        "incoming request"
    );

    let response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    // set by the identity middleware on protected routes
    let caller = response
        .extensions()
        .get::<Principal>()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_owned());

    match status {
        500..=599 => tracing::error!(
            request_id = %request_id, method = %method, path = %matched_path,
            status, duration_ms, caller = %caller, "request failed"
        ),
        400..=499 => tracing::warn!(
            request_id = %request_id, method = %method, path = %matched_path,
            status, duration_ms, caller = %caller, "request rejected"
        ),
        _ => tracing::info!(
            request_id = %request_id, method = %method, path = %matched_path,
            status, duration_ms, caller = %caller, "request completed"
        ),
    }

    response
}
