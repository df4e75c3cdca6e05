/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "active_connections": 1, "idle_connections": 4 }
/// }
/// ```
///
/// When the database does not answer, `status` is `degraded`, `database` is
/// `disconnected` and the HTTP status is 503.

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tasktrack_shared::db::pool::{get_pool_stats, health_check as ping, PoolStats};
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// Connection pool usage
    #[serde(skip_deserializing)]
    pub pool: Option<PoolStats>,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connected = match ping(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    let (code, status, database) = if connected {
        (StatusCode::OK, "healthy", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "disconnected")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
            pool: Some(get_pool_stats(&state.db)),
        }),
    )
}
