//! Authentication routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::middleware::no_store;
use crate::state::AppState;

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
        .route("/auth/profile", get(auth::get_profile))
        .layer(middleware::from_fn(no_store))
}

/// Routes other services use to verify access tokens
pub fn key_routes() -> Router<AppState> {
    Router::new().route("/.well-known/jwks.json", get(auth::jwks))
}
