//! Voice gateway entry point

use std::net::SocketAddr;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use voicegate_config::{ObservabilityConfig, Settings};
use voicegate_server::{create_router, AppState, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config_path = std::env::var("VOICEGATE_CONFIG").ok();
    let settings = Settings::load(config_path.as_deref().map(Path::new))?;

    init_tracing(&settings.observability);
    tracing::info!("Starting voicegate v{}", env!("CARGO_PKG_VERSION"));

    settings.validate()?;

    let port = settings.server.port;
    let state = AppState::new(settings);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    if observability.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
