//! Health check handler

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// GET /health
///
/// Reports 503 when the configured database is unreachable.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.database {
        Some(db) => {
            if db.is_healthy().await {
                "connected"
            } else {
                "unreachable"
            }
        }
        None => "not_configured",
    };

    let (status_code, status) = if database == "unreachable" {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else {
        (StatusCode::OK, "healthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            storage: state.storage_backend.as_str(),
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
