//! Authentication middleware
//!
//! Bearer access token verification and account extraction.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::auth::{AuthError, AuthService};
use crate::error::ApiError;

/// Account extracted from a valid access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub account_id: String,
    pub email: String,
}

/// Extractor for authenticated accounts
///
/// Verifies the RS256 access token from the Authorization header. The token
/// is self-contained, so no storage lookup happens here.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, account {}", user.account_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::from(AuthError::Unauthorized).into_response())?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let claims = auth_service
            .validate_access_token(bearer.token())
            .map_err(|e| ApiError::from(e).into_response())?;

        Ok(AuthenticatedUser {
            account_id: claims.account_id,
            email: claims.email,
        })
    }
}
