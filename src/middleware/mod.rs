//! Middleware for the keygate API
//!
//! This module provides middleware for request tracing, security headers,
//! and bearer token authentication.

pub mod auth;
mod security;
mod tracing;

pub use auth::AuthenticatedUser;
pub use security::{hsts_header, no_store, security_headers};
pub use self::tracing::request_tracing;
