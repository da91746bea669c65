//! keygate library
//!
//! Credential verification and session issuance: bcrypt password checks,
//! RS256 access tokens with a published JWK set, and rotating opaque
//! refresh tokens.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
