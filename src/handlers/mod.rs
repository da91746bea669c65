//! API handlers for keygate

pub mod auth;
mod extract;
mod health;

pub use auth::*;
pub use extract::ValidatedJson;
pub use health::{health_check, HealthResponse};

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::AuthenticatedUser;
