use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod gateway;
mod http;
mod notifier;
mod preview;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = config::Config::from_env();
    if let Some(parent) = config.probe_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.gallery_dir)?;

    let (display_tx, display_rx) = watch::channel(engine::DisplayState::default());
    let engine = engine::spawn_engine(&config, display_tx)?;

    let (preview_tx, preview_rx) = watch::channel(None);
    preview::spawn_preview(
        engine.camera.clone(),
        Duration::from_millis(config.preview_interval_ms),
        config.probe_crop,
        preview_tx,
    );

    let gateway = gateway::TriggerGateway::new(engine.state.clone(), engine.handle.clone());

    let app_state = Arc::new(http::AppState {
        gateway,
        display: display_rx,
        preview: preview_rx,
        stage: engine.state,
        started_at: Instant::now(),
    });

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP interface listening");

    let app = http::router(app_state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server exited");
        }
    });

    tracing::info!("facegated ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facegated shutting down");

    Ok(())
}
