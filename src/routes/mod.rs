//! Route definitions for the keygate API

mod auth;

use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

pub use auth::{auth_routes, key_routes};

/// Build the full application router with its middleware stack
///
/// `cors_origins` is a comma separated allow-list; `None` or an empty string
/// falls back to a permissive policy.
pub fn create_router(state: AppState, cors_origins: Option<&str>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(key_routes())
        .merge(auth_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(cors_origins))
}

fn configure_cors(cors_origins: Option<&str>) -> CorsLayer {
    let allowed = cors_origins.unwrap_or_default().trim();

    if allowed.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
