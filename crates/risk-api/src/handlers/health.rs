//! Liveness and readiness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

/// Liveness payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process can answer at all.
    pub status: String,
    /// Crate version compiled into the binary.
    pub version: String,
    /// When the probe ran.
    pub checked_at: DateTime<Utc>,
}

/// Readiness payload, including per-dependency results.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadyResponse {
    /// "ready" when every dependency answered, "degraded" otherwise.
    pub status: String,
    /// Crate version compiled into the binary.
    pub version: String,
    /// When the probe ran.
    pub checked_at: DateTime<Utc>,
    /// Postgres round-trip outcome.
    pub database: String,
}

/// Liveness probe. Touches no dependencies.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checked_at: Utc::now(),
    })
}

/// Readiness probe. Round-trips Postgres and answers 503 while it is
/// unreachable.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies reachable", body = ReadyResponse),
        (status = 503, description = "Postgres unreachable", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => "reachable".to_string(),
        Err(e) => format!("unreachable: {}", e),
    };

    let ready = database == "reachable";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadyResponse {
        status: if ready { "ready" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checked_at: Utc::now(),
        database,
    };

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness_is_static_ok() {
        let response = health_check().await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }
}
