//! Disaster alert service.
//!
//! Authoritative alert, resource and report records live in one store (PostGIS in production,
//! an in-process map for development). Every committed alert write is fanned out to the
//! connected socket sessions, and [`cache::ReconciliationCache`] is the client-side view
//! that merges those broadcasts with its own optimistic writes.

use anyhow::Result;
use tokio::{
    net::TcpListener,
    signal::ctrl_c,
};
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

pub mod auth;
pub mod bus;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod models;
pub mod protocol;
pub mod routes;
pub mod state;

use config::AppConfig;
use state::AppState;

pub async fn start_server(config: AppConfig) -> Result<()> {
    info!("Initializing state...");
    let state = AppState::new(config).await?;

    let app = routes::build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
