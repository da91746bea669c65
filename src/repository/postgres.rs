//! PostgreSQL storage adapter

use async_trait::async_trait;
use sqlx::PgPool;

use super::{AccountRepository, RefreshTokenRepository, StorageError};
use crate::models::{Account, RefreshTokenRecord};

/// Account repository backed by the `accounts` table
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create(&self, account: &Account) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, password_hash, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.name)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StorageError> {
        let account = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, name, created_at, updated_at, deleted_at
            FROM accounts
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError> {
        let account = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, name, created_at, updated_at, deleted_at
            FROM accounts
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn update(&self, account: &Account) -> Result<(), StorageError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE accounts
            SET email = $2, password_hash = $3, name = $4, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.name)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE accounts
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StorageError::NotFound);
        }

        Ok(())
    }
}

/// Refresh token repository backed by the `refresh_tokens` table
#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_REFRESH_TOKEN: &str = r#"
    INSERT INTO refresh_tokens (id, account_id, token, expires_at, revoked, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), StorageError> {
        sqlx::query(INSERT_REFRESH_TOKEN)
            .bind(record.id)
            .bind(&record.account_id)
            .bind(&record.token)
            .bind(record.expires_at)
            .bind(record.revoked)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StorageError> {
        let record = sqlx::query_as(
            r#"
            SELECT id, account_id, token, expires_at, revoked, created_at, updated_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_account_id(
        &self,
        account_id: &str,
    ) -> Result<Vec<RefreshTokenRecord>, StorageError> {
        let records = sqlx::query_as(
            r#"
            SELECT id, account_id, token, expires_at, revoked, created_at, updated_at
            FROM refresh_tokens
            WHERE account_id = $1 AND revoked = FALSE
            ORDER BY created_at ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn revoke(&self, token: &str) -> Result<bool, StorageError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, updated_at = NOW()
            WHERE token = $1 AND revoked = FALSE
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn revoke_all_by_account_id(&self, account_id: &str) -> Result<u64, StorageError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, updated_at = NOW()
            WHERE account_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn rotate(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        // The conditional update is what makes a token single-use: a
        // concurrent redeemer finds zero rows and backs off.
        let rows_affected = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, updated_at = NOW()
            WHERE token = $1 AND revoked = FALSE
            "#,
        )
        .bind(presented)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(INSERT_REFRESH_TOKEN)
            .bind(replacement.id)
            .bind(&replacement.account_id)
            .bind(&replacement.token)
            .bind(replacement.expires_at)
            .bind(replacement.revoked)
            .bind(replacement.created_at)
            .bind(replacement.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn delete_expired(&self) -> Result<u64, StorageError> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM refresh_tokens WHERE expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }
}
