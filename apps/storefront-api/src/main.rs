//! # Storefront API
//!
//! HTTP server for carts, checkout and Midtrans payment notifications.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  .env ─► AppConfig ─► Database (migrations) ─► MidtransClient           │
//! │                                    │                                    │
//! │                                    ▼                                    │
//! │                     AppState ─► Router ─► axum::serve(0.0.0.0:APP_PORT) │
//! │                                                │                        │
//! │                              Ctrl+C / SIGTERM ─┘ graceful shutdown      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use storefront_api::config::AppConfig;
use storefront_api::{router, AppState};
use storefront_db::Database;
use storefront_gateway::MidtransClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront=debug,sqlx=warn,tower_http=info".into()),
        )
        .with_target(true)
        .init();

    info!("Starting storefront API...");

    let config = AppConfig::load()?;
    info!(
        port = config.port,
        app_url = %config.app_url,
        environment = %config.environment,
        verify_signature = config.verify_signature,
        tax_percent = %config.tax_percent,
        "Configuration loaded"
    );
    if !config.verify_signature {
        warn!("Notification signature verification is disabled");
    }

    let db = Database::new(config.db_config()).await?;
    info!(path = %config.database_url, "Database ready");

    let gateway = Arc::new(MidtransClient::new(config.gateway_config())?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(db.clone(), gateway, config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
