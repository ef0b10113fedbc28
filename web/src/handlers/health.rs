//! Health endpoint.
//!
//! Used by load balancers; reports the KV cluster and session store
//! status with 503 when unhealthy.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `unhealthy`.
    pub status: &'static str,
    /// Current time, RFC 3339.
    pub timestamp: String,
    /// Per-dependency status.
    pub services: ServiceHealth,
}

/// Per-dependency health flags.
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    /// KV cluster reachable.
    pub redis: bool,
    /// Session store operational.
    pub session: bool,
}

/// Report gateway health.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let redis = state.sessions.healthy().await;

    let response = HealthResponse {
        status: if redis { "ok" } else { "unhealthy" },
        timestamp: Utc::now().to_rfc3339(),
        services: ServiceHealth {
            redis,
            session: redis,
        },
    };

    let status = if redis {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
