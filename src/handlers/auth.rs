//! Authentication HTTP handlers
//!
//! Endpoints for password-based authentication and session management.

use axum::{extract::State, http::StatusCode, Json};

use super::{AuthenticatedUser, ValidatedJson};
use crate::auth::JwkSet;
use crate::error::ApiResult;
use crate::models::{
    AccountResponse, AuthResponse, LoginRequest, LogoutAllResponse, MessageResponse,
    RefreshTokenRequest, RegisterRequest,
};
use crate::state::AppState;

/// POST /auth/register - Create an account and return its first token pair
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let tokens = state
        .auth_service
        .register(&req.email, &req.password, &req.name)
        .await?;

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /auth/login - Exchange email and password for a token pair
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let tokens = state.auth_service.login(&req.email, &req.password).await?;
    Ok(Json(tokens))
}

/// POST /auth/refresh - Rotate a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let tokens = state.auth_service.refresh(&req.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /auth/logout - Revoke one refresh token
pub async fn logout(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth_service.logout(&req.refresh_token).await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// POST /auth/logout-all - Revoke every session of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<LogoutAllResponse>> {
    let revoked_sessions = state.auth_service.logout_all(&user.account_id).await?;

    Ok(Json(LogoutAllResponse {
        message: "Logged out from all sessions".to_string(),
        revoked_sessions,
    }))
}

/// GET /auth/profile - Current account
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<AccountResponse>> {
    let account = state.auth_service.get_account(&user.account_id).await?;
    Ok(Json(account))
}

/// GET /.well-known/jwks.json - Public signing keys
pub async fn jwks(State(state): State<AppState>) -> Json<JwkSet> {
    Json(state.auth_service.public_key_set().clone())
}
