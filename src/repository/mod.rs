//! Storage boundary for accounts and refresh tokens
//!
//! The auth service only talks to these traits. `postgres` is the production
//! adapter; `memory` backs tests and local runs without a database.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Account, RefreshTokenRecord};

mod memory;
mod postgres;

pub use memory::{InMemoryAccountRepository, InMemoryRefreshTokenRepository};
pub use postgres::{PgAccountRepository, PgRefreshTokenRepository};

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StorageError::Duplicate(db_err.message().to_string())
            }
            _ => StorageError::Database(err.to_string()),
        }
    }
}

/// Account persistence
///
/// Soft-deleted accounts are invisible to every lookup.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with `StorageError::Duplicate` when the email is taken.
    async fn create(&self, account: &Account) -> Result<(), StorageError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StorageError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError>;

    async fn update(&self, account: &Account) -> Result<(), StorageError>;

    /// Soft delete: the row stays, lookups stop returning it.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// Refresh token persistence
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), StorageError>;

    /// Returns revoked and expired records too; validity is the caller's call.
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StorageError>;

    /// Non-revoked records of an account.
    async fn find_by_account_id(
        &self,
        account_id: &str,
    ) -> Result<Vec<RefreshTokenRecord>, StorageError>;

    /// Returns whether an active record was revoked by this call.
    async fn revoke(&self, token: &str) -> Result<bool, StorageError>;

    /// Returns the number of records revoked by this call.
    async fn revoke_all_by_account_id(&self, account_id: &str) -> Result<u64, StorageError>;

    /// Revoke `presented` and store `replacement` as one unit.
    ///
    /// Returns `Ok(false)` without storing anything when `presented` was
    /// already revoked (or missing), so a token is redeemed at most once even
    /// under concurrent refreshes.
    async fn rotate(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, StorageError>;

    /// Returns the number of records purged.
    async fn delete_expired(&self) -> Result<u64, StorageError>;
}
