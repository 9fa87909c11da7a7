use common::tracing::init_tracing_for;
use forecast_service::config::Config;
use forecast_service::{build_state, create_router, load_credentials};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing_for(&config.log_format);

    let state = build_state(&config).await?;
    let credentials = load_credentials(&config).await?;
    if credentials.is_none() {
        warn!("AUTH_USERS_FILE not set, forecast routes are unauthenticated");
    }

    let app = create_router(state, credentials);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Forecast service starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Forecast service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }

    warn!("Shutting down gracefully...");
}
