//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthService;
use crate::config::StorageBackend;
use crate::db::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    /// Present only when running on the postgres backend
    pub database: Option<Database>,
    pub storage_backend: StorageBackend,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        database: Option<Database>,
        storage_backend: StorageBackend,
    ) -> Self {
        Self {
            auth_service,
            database,
            storage_backend,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}
