//! HTTP interface for document listing, distribution and log review

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

pub mod error;
pub mod origin;
pub mod routes;

use crate::config::ServerConfig;
use crate::distribute::Distributor;
use crate::error::Result;
use routes::{
    download_handler, export_logs_handler, health_handler, list_documents_handler, logs_handler,
};

/// Shared request state
#[derive(Debug)]
pub struct AppState {
    pub distributor: Distributor,
}

impl AppState {
    pub fn new(distributor: Distributor) -> Arc<Self> {
        Arc::new(Self { distributor })
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/documents", get(list_documents_handler))
        .route("/api/documents/{name}/download", post(download_handler))
        .route("/api/admin/download-logs", get(logs_handler))
        .route("/api/admin/download-logs/export", get(export_logs_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM
pub async fn start_server(config: &ServerConfig) -> Result<()> {
    info!("Documents directory: {}", config.documents_dir.display());
    info!("Audit log: {}", config.audit_log.display());

    let state = AppState::new(config.distributor());
    let app = router(state);

    let address = config.address();
    info!("Binding to {address}");

    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
