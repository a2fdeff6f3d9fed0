mod cleanup;
mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use murmur_api::{AppState, AppStateInner};
use murmur_db::Database;
use murmur_gateway::Dispatcher;
use murmur_media::{MediaPolicy, Storage};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    let storage = Storage::new(config.media_dir.clone()).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        storage,
        media_policy: MediaPolicy::with_max_bytes(config.max_upload_bytes),
        dispatcher: Dispatcher::new(),
        session_secret: config.session_secret.clone(),
    });

    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), config.sweep_interval_secs));

    let app = murmur_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Murmur listening on {}", config.addr);
    info!(
        "Media dir: {} (max upload {} bytes), sweep every {}s",
        config.media_dir.display(),
        config.max_upload_bytes,
        config.sweep_interval_secs
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
