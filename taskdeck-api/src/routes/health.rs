/// Health check endpoint
///
/// ```text
/// GET /api/v1/health
/// ```
///
/// ```json
/// {
///   "success": true,
///   "message": "TaskDeck API is running",
///   "data": {
///     "status": "healthy",
///     "version": "0.1.0",
///     "timestamp": "2026-01-01T00:00:00Z",
///     "storage": "postgres",
///     "database": "connected",
///     "pool": { "activeConnections": 0, "idleConnections": 2, "totalConnections": 2 }
///   }
/// }
/// ```

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use taskdeck_shared::db::pool::{get_pool_stats, PoolStats};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the store does not answer
    pub status: String,

    pub version: String,
    pub timestamp: DateTime<Utc>,

    /// Configured storage backend
    pub storage: String,

    /// `connected` or `disconnected`
    pub database: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

/// Landing payload for `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub health: String,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<ApiResponse<HealthResponse>> {
    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(err) => {
            warn!(error = %err, "Health check could not reach the store");
            "disconnected"
        }
    };

    let health = HealthResponse {
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        storage: state.config.database.backend.to_string(),
        database: database.to_string(),
        pool: state.pool.as_ref().map(get_pool_stats),
    };

    Ok(ApiResponse::ok("TaskDeck API is running", health))
}

pub async fn root() -> ApiResponse<ServiceInfo> {
    ApiResponse::ok(
        "TaskDeck API",
        ServiceInfo {
            name: "taskdeck-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            health: "/api/v1/health".to_string(),
        },
    )
}
