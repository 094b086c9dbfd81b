// HTTP interface. Handlers translate requests into FleetService calls and
// AppError kinds into status codes.

mod handlers;
mod router;
mod schemas;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use handlers::health::HealthResponse;
pub use router::{create_router, REQUEST_TIMEOUT};
pub use schemas::*;

/// Bind `bind_address` and serve the API until Ctrl-C.
pub async fn serve(state: AppState, bind_address: &str) -> Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind to address {}", bind_address))?;

    info!("Server running on http://{}", bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
