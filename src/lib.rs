// lib.rs - AutoToon Studio dashboard backend
pub mod assets;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod services;
pub mod store;

use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::assets::SharedAssetLoader;
use crate::config::AppConfig;
use crate::identity::IdentityProvider;
use crate::jobs::GenerationController;
use crate::notify::NotificationLog;
use crate::services::GalleryService;
use crate::store::SharedFileStore;

/// Toasts kept until the dashboard drains them.
const NOTIFICATION_CAPACITY: usize = 50;

// Shared state handed to every handler
pub struct AppState {
    pub config: AppConfig,
    pub store: SharedFileStore,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifications: Arc<NotificationLog>,
    pub generation: Arc<GenerationController>,
    pub gallery: Arc<GalleryService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: SharedFileStore,
        identity: Arc<dyn IdentityProvider>,
        assets: SharedAssetLoader,
    ) -> Self {
        let notifications = Arc::new(NotificationLog::new(NOTIFICATION_CAPACITY));
        let generation = Arc::new(GenerationController::new(
            store.clone(),
            identity.clone(),
            assets.clone(),
            notifications.clone(),
            config.timings,
        ));
        let gallery = Arc::new(GalleryService::new(
            store.clone(),
            assets,
            notifications.clone(),
            config.timings,
        ));
        Self {
            config,
            store,
            identity,
            notifications,
            generation,
            gallery,
        }
    }
}

/// Full application router: public status, identity-gated API and static assets.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .merge(handlers::generation::generation_routes())
        .merge(handlers::gallery::gallery_routes())
        .merge(handlers::system::account_routes())
        .route_layer(axum::middleware::from_fn(middleware::auth::require_identity));

    Router::new()
        .merge(handlers::system::status_routes())
        .merge(protected)
        .nest_service("/assets", ServeDir::new(&state.config.assets_dir))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
