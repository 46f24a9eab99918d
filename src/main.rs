use std::sync::Arc;

use autotoon::assets::loader_for;
use autotoon::config::AppConfig;
use autotoon::identity::StaticIdentity;
use autotoon::store::{HttpFileStore, InMemoryFileStore, SharedFileStore};
use autotoon::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = AppConfig::from_env()?;

    // Remote File Store when configured, otherwise everything stays in-process
    let store: SharedFileStore = match config.file_store_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to File Store at {}...", url);
            let store = Arc::new(HttpFileStore::new(url));
            let readiness = store.clone();
            tokio::spawn(async move { readiness.wait_until_ready().await });
            store
        }
        None => {
            tracing::warn!("FILE_STORE_URL not set. Using the in-memory File Store; uploads are lost on restart.");
            Arc::new(InMemoryFileStore::new())
        }
    };

    let assets = loader_for(&config.placeholder_asset);
    // A bad placeholder only fails video creation, so startup carries on
    match assets.load_placeholder().await {
        Ok(bytes) => tracing::info!("✅ Placeholder video ready ({} bytes)", bytes.len()),
        Err(e) => tracing::error!("❌ {}", e),
    }

    match &config.principal {
        Some(principal) => tracing::info!("👤 Dashboard acting as {}", principal),
        None => tracing::warn!("DASHBOARD_PRINCIPAL not set. API requests will be rejected until someone signs in."),
    }
    let identity = Arc::new(StaticIdentity::new(config.principal.clone()));

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, store, identity, assets));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,autotoon=trace,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,autotoon=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // JSON for log aggregation, human-readable otherwise
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("🎬 AutoToon Studio starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
