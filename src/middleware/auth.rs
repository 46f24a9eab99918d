// src/middleware/auth.rs
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::AppState;

/// Rejects requests while nobody is signed in and hands the caller's
/// principal to the handlers through request extensions.
pub async fn require_identity(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = match state.identity.current() {
        Some(principal) => principal,
        None => {
            tracing::debug!("Rejected {} {}: not signed in", request.method(), request.uri());
            return Err(AppError::Unauthorized("no signed-in caller".to_string()));
        }
    };

    request.extensions_mut().insert(principal.clone());
    let mut response = next.run(request).await;
    // for the request log
    response.extensions_mut().insert(principal);
    Ok(response)
}
