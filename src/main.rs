//! Audiobook Server
//!
//! Converts uploaded PDF documents into spoken audio.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiobook_server::config::Config;
use audiobook_server::routes;
use audiobook_server::state::{AppState, Backends};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "audiobook_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Audiobook Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        backend = ?config.storage.backend,
        data_dir = %config.storage.data_dir.display(),
        "Storage"
    );
    tracing::info!(
        format = %config.pipeline.output_format,
        bitrate_kbps = config.pipeline.output_bitrate_kbps,
        max_chunk_chars = config.pipeline.max_chunk_chars,
        concurrency = config.pipeline.synthesis_concurrency,
        "Pipeline"
    );

    let backends = Backends::from_config(&config).context("Failed to initialize backends")?;

    // Leftovers from a previous run are never resumed
    backends
        .storage
        .init()
        .await
        .context("Failed to initialize storage")?;
    backends.storage.purge().await;

    let available = backends.ocr.available_providers().await;
    if available.is_empty() {
        tracing::warn!("No OCR provider available; scanned documents will fail");
    } else {
        tracing::info!("OCR providers available: {:?}", available);
    }

    let port = config.server.port;
    let app_state = AppState::new(config, backends);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Audiobook Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let coordinator = app_state.coordinator().clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            coordinator.shutdown();
        })
        .await
        .context("Server error")?;

    app_state.storage().purge().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
