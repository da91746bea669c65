//! Authentication module for keygate
//!
//! Provides password-based authentication with RS256 access tokens.
//! - bcrypt password hashing
//! - Access token signing, validation and JWK set export
//! - Opaque refresh tokens with single-use rotation and revocation

mod cleanup;
mod jwt;
mod password;
mod refresh;
mod service;

pub use cleanup::{expired_token_sweeper, sweep_expired_tokens};
pub use jwt::{Claims, Jwk, JwkSet, JwtError, JwtManager, DEFAULT_ISSUER};
pub use password::{PasswordError, PasswordHasher, DEFAULT_COST};
pub use refresh::{generate_refresh_token, RefreshTokenIssuer, REFRESH_TOKEN_BYTES};
pub use service::{AuthError, AuthService};
