use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use courier_dispatch::api;
use courier_dispatch::config::{Config, LogFormat};
use courier_dispatch::engine::dispatch::run_dispatch_worker;
use courier_dispatch::engine::reconciler::run_reconciler;
use courier_dispatch::error::AppError;
use courier_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let (app_state, order_rx) = AppState::new(&config);
    let shared_state = Arc::new(app_state);
    let shutdown = CancellationToken::new();

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_dispatch_worker(shared_state.clone(), order_rx));
    let reconciler = tokio::spawn(run_reconciler(shared_state.clone(), shutdown.clone()));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        radius_km = config.dispatch.radius_km,
        offer_window_secs = config.dispatch.offer_window.as_secs(),
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    shutdown.cancel();
    if let Err(err) = reconciler.await {
        tracing::error!(error = %err, "reconciler task failed");
    }

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    shutdown.cancel();
}
