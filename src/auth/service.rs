//! Authentication service
//!
//! Composes password verification, access token signing and refresh token
//! storage into register / login / refresh / logout flows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use crate::models::{Account, AccountResponse, AuthResponse, RefreshTokenRecord, TokenState};
use crate::repository::{AccountRepository, RefreshTokenRepository, StorageError};

use super::jwt::{Claims, JwkSet, JwtError, JwtManager};
use super::password::{PasswordError, PasswordHasher};
use super::refresh::RefreshTokenIssuer;

/// Auth service errors
///
/// Everything above `Storage` is the closed set callers are expected to
/// handle; `Storage` and `Internal` are server-side failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Account not found")]
    AccountNotFound,

    #[error("Account already exists")]
    AccountAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Refresh token expired")]
    TokenExpired,

    #[error("Refresh token revoked")]
    TokenRevoked,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

// Only issuance goes through this conversion; validation failures are mapped
// to `InvalidToken` explicitly.
impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

/// Authentication service
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    jwt: Arc<JwtManager>,
    refresh_issuer: RefreshTokenIssuer,
    hasher: PasswordHasher,
    /// Verified against when the email is unknown, so both login failures
    /// cost one bcrypt round.
    dummy_hash: String,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        jwt: Arc<JwtManager>,
        refresh_token_ttl: Duration,
        hasher: PasswordHasher,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hasher.hash(&super::refresh::generate_refresh_token())?;

        Ok(Self {
            accounts,
            refresh_tokens,
            jwt,
            refresh_issuer: RefreshTokenIssuer::new(refresh_token_ttl),
            hasher,
            dummy_hash,
        })
    }

    /// Create an account and issue its first token pair
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthResponse, AuthError> {
        if self.accounts.find_by_email(email).await?.is_some() {
            return Err(AuthError::AccountAlreadyExists);
        }

        let password_hash = self.hash_password(password).await?;
        let account = Account::new(email, password_hash, name);

        // A concurrent registration can still win the race past the check above.
        match self.accounts.create(&account).await {
            Err(StorageError::Duplicate(_)) => return Err(AuthError::AccountAlreadyExists),
            other => other?,
        }

        tracing::info!(account_id = %account.id, "Account registered");

        self.issue_token_pair(&account).await
    }

    /// Authenticate with email and password
    ///
    /// An unknown email and a wrong password produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let Some(account) = self.accounts.find_by_email(email).await? else {
            // Burn the same hashing cost as a real comparison.
            let _ = self.verify_password(password, &self.dummy_hash).await;
            tracing::debug!("Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &account.password_hash).await? {
            tracing::debug!(account_id = %account.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(account_id = %account.id, "Account logged in");

        self.issue_token_pair(&account).await
    }

    /// Redeem a refresh token for a new token pair
    ///
    /// The presented token is revoked in the same storage unit that stores its
    /// replacement, so it can be redeemed at most once.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        let record = self
            .refresh_tokens
            .find_by_token(refresh_token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        match record.state_at(Utc::now()) {
            TokenState::Active => {}
            TokenState::Revoked => {
                tracing::warn!(account_id = %record.account_id, "Revoked refresh token presented");
                return Err(AuthError::TokenRevoked);
            }
            TokenState::Expired => return Err(AuthError::TokenExpired),
        }

        let account = self
            .accounts
            .find_by_id(&record.account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let (access_token, replacement) = self.mint_tokens(&account)?;

        if !self.refresh_tokens.rotate(refresh_token, &replacement).await? {
            // Lost a race with another redemption of the same token.
            tracing::warn!(account_id = %account.id, "Refresh token redeemed concurrently");
            return Err(AuthError::TokenRevoked);
        }

        tracing::info!(account_id = %account.id, "Refresh token rotated");

        Ok(self.token_response(&account, access_token, replacement.token))
    }

    /// Revoke a single refresh token
    ///
    /// Unknown and already revoked tokens are accepted silently: either way
    /// the token can no longer be used.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let revoked = self.refresh_tokens.revoke(refresh_token).await?;
        tracing::debug!(revoked, "Logout processed");
        Ok(())
    }

    /// Revoke every active refresh token of an account
    pub async fn logout_all(&self, account_id: &str) -> Result<u64, AuthError> {
        let revoked = self
            .refresh_tokens
            .revoke_all_by_account_id(account_id)
            .await?;
        tracing::info!(account_id = %account_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Validate an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.jwt.validate_access_token(token).map_err(|e| {
            if e.is_validation_failure() {
                tracing::debug!(reason = %e, "Access token rejected");
            } else {
                tracing::error!(error = %e, "Access token validation failed");
            }
            AuthError::InvalidToken
        })
    }

    /// Get an account profile by id
    pub async fn get_account(&self, account_id: &str) -> Result<AccountResponse, AuthError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        Ok(AccountResponse::from(&account))
    }

    /// Active refresh token records of an account
    pub async fn active_sessions(
        &self,
        account_id: &str,
    ) -> Result<Vec<RefreshTokenRecord>, AuthError> {
        let now = Utc::now();
        let records = self.refresh_tokens.find_by_account_id(account_id).await?;
        Ok(records.into_iter().filter(|r| r.is_valid_at(now)).collect())
    }

    pub fn public_key_set(&self) -> &JwkSet {
        self.jwt.public_key_set()
    }

    /// Issue and persist a fresh token pair for an account
    async fn issue_token_pair(&self, account: &Account) -> Result<AuthResponse, AuthError> {
        let (access_token, record) = self.mint_tokens(account)?;
        self.refresh_tokens.create(&record).await?;
        Ok(self.token_response(account, access_token, record.token))
    }

    fn mint_tokens(&self, account: &Account) -> Result<(String, RefreshTokenRecord), AuthError> {
        let access_token = self.jwt.issue_access_token(&account.id, &account.email)?;
        let (token, expires_at) = self
            .refresh_issuer
            .issue(&account.id)
            .ok_or_else(|| AuthError::Internal("Refresh token expiry out of range".to_string()))?;
        Ok((
            access_token,
            RefreshTokenRecord::new(&account.id, token, expires_at),
        ))
    }

    fn token_response(
        &self,
        account: &Account,
        access_token: String,
        refresh_token: String,
    ) -> AuthResponse {
        AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_ttl_seconds(),
            user: AccountResponse::from(account),
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(AuthError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_is_not_a_client_error() {
        let err: AuthError = StorageError::Database("down".to_string()).into();
        assert!(matches!(err, AuthError::Storage(_)));
    }

    #[test]
    fn test_password_error_is_internal() {
        let err: AuthError = PasswordError::MalformedHash("bad".to_string()).into();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[test]
    fn test_jwt_issuance_error_is_internal() {
        let err: AuthError = JwtError::EncodingFailed("bad key".to_string()).into();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
