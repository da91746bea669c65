//! In-memory storage adapter
//!
//! Every multi-step operation runs under a single write lock, which gives the
//! same uniqueness and rotation guarantees as the PostgreSQL adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{AccountRepository, RefreshTokenRepository, StorageError};
use crate::models::{Account, RefreshTokenRecord};

/// Accounts keyed by id
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts, soft-deleted ones included
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create(&self, account: &Account) -> Result<(), StorageError> {
        let mut accounts = self.accounts.write().await;

        // Mirrors the unique index, which also covers soft-deleted rows.
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StorageError::Duplicate(format!(
                "email {} already registered",
                account.email
            )));
        }
        if accounts.contains_key(&account.id) {
            return Err(StorageError::Duplicate(format!("account id {}", account.id)));
        }

        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StorageError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(id).filter(|a| !a.is_deleted()).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.email == email && !a.is_deleted())
            .cloned())
    }

    async fn update(&self, account: &Account) -> Result<(), StorageError> {
        let mut accounts = self.accounts.write().await;

        if accounts
            .values()
            .any(|a| a.email == account.email && a.id != account.id)
        {
            return Err(StorageError::Duplicate(format!(
                "email {} already registered",
                account.email
            )));
        }

        let existing = accounts
            .get_mut(&account.id)
            .filter(|a| !a.is_deleted())
            .ok_or(StorageError::NotFound)?;

        existing.email = account.email.clone();
        existing.password_hash = account.password_hash.clone();
        existing.name = account.name.clone();
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let mut accounts = self.accounts.write().await;
        let existing = accounts
            .get_mut(id)
            .filter(|a| !a.is_deleted())
            .ok_or(StorageError::NotFound)?;

        let now = Utc::now();
        existing.deleted_at = Some(now);
        existing.updated_at = now;
        Ok(())
    }
}

/// Refresh token records keyed by token value
#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    records: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, revoked and expired ones included
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn insert_unique(
    records: &mut HashMap<String, RefreshTokenRecord>,
    record: &RefreshTokenRecord,
) -> Result<(), StorageError> {
    if records.contains_key(&record.token) {
        return Err(StorageError::Duplicate("refresh token".to_string()));
    }
    records.insert(record.token.clone(), record.clone());
    Ok(())
}

fn revoke_record(record: &mut RefreshTokenRecord) -> bool {
    if record.revoked {
        return false;
    }
    record.revoked = true;
    record.updated_at = Utc::now();
    true
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        insert_unique(&mut records, record)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(token).cloned())
    }

    async fn find_by_account_id(
        &self,
        account_id: &str,
    ) -> Result<Vec<RefreshTokenRecord>, StorageError> {
        let records = self.records.read().await;
        let mut found: Vec<RefreshTokenRecord> = records
            .values()
            .filter(|r| r.account_id == account_id && !r.revoked)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    async fn revoke(&self, token: &str) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(token).map(revoke_record).unwrap_or(false))
    }

    async fn revoke_all_by_account_id(&self, account_id: &str) -> Result<u64, StorageError> {
        let mut records = self.records.write().await;
        let revoked = records
            .values_mut()
            .filter(|r| r.account_id == account_id)
            .map(revoke_record)
            .filter(|changed| *changed)
            .count();
        Ok(revoked as u64)
    }

    async fn rotate(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;

        if records.contains_key(&replacement.token) {
            return Err(StorageError::Duplicate("refresh token".to_string()));
        }

        let revoked = records
            .get_mut(presented)
            .map(revoke_record)
            .unwrap_or(false);
        if !revoked {
            return Ok(false);
        }

        insert_unique(&mut records, replacement)?;
        Ok(true)
    }

    async fn delete_expired(&self) -> Result<u64, StorageError> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, r| !r.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}
