// src/handlers/system.rs
use axum::{
    extract::Extension,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::dashboard::{CallerResponse, ServiceStatusResponse};
use crate::models::file::{Principal, UserRole};
use crate::notify::Notification;
use crate::AppState;

/// GET /api/status - public health summary
pub async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<ServiceStatusResponse> {
    let store_ready = state.store.is_ready();
    Json(ServiceStatusResponse {
        status: if store_ready { "ready" } else { "initializing" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store.name().to_string(),
        store_ready,
        signed_in: state.identity.current().is_some(),
        generation_step: state.generation.snapshot().step,
    })
}

/// GET /api/me - who the dashboard acts as
pub async fn current_caller(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
) -> Result<Json<CallerResponse>, AppError> {
    let role = state.store.get_caller_user_role(&caller).await?;
    Ok(Json(CallerResponse {
        principal: caller,
        role,
        is_admin: role == UserRole::Admin,
    }))
}

/// GET /api/notifications - pending toasts, oldest first
pub async fn drain_notifications(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<Notification>> {
    Json(state.notifications.drain())
}

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

pub fn account_routes() -> Router {
    Router::new()
        .route("/api/me", get(current_caller))
        .route("/api/notifications", get(drain_notifications))
}
