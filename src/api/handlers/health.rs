use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::api::schemas::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Health check endpoint
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match state.service.health().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(err) => {
            warn!("Database ping failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    let response = HealthResponse {
        status: if status == StatusCode::OK { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    };
    (status, Json(response))
}
