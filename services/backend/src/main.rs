use backend::config::Config;
use backend::recorder::RecorderHandle;
use backend::{build_router, udp, AppState};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    let recorder = RecorderHandle::spawn(config.record_dir.clone(), config.retention);
    let state = AppState::new(config, recorder);

    // A malformed rule file is a startup error; a missing one is an empty set.
    match state.rules.reload() {
        Ok(count) => info!(count, path = %state.rules.path().display(), "rules loaded"),
        Err(e) => {
            error!(error = %e, "failed to load rules");
            std::process::exit(1);
        }
    }

    let udp_handle = match udp::spawn(state.clone()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to bind UDP listener");
            std::process::exit(1);
        }
    };

    let bind_addr = state.config.http_bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "server listening");
    info!(health = %state.config.ui_url("/healthz"), ws = %state.config.ui_url("/ws"), "endpoints");

    let router = build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    udp_handle.stop().await;
    state.recorder.stop().await;
    info!("server shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
