//! Data models for the keygate service

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Alphabet for account ids, without the easily confused 0, 1, I, O, l and o
const ACCOUNT_ID_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz";

/// Length of every generated account id
pub const ACCOUNT_ID_LEN: usize = 16;

/// Generate a fresh account identifier
pub fn generate_account_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCOUNT_ID_LEN)
        .map(|_| ACCOUNT_ID_ALPHABET[rng.gen_range(0..ACCOUNT_ID_ALPHABET.len())] as char)
        .collect()
}

/// Account model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Build a new, not yet persisted account
    pub fn new(email: &str, password_hash: String, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: generate_account_id(),
            email: email.to_string(),
            password_hash,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
        }
    }
}

/// Observable state of a refresh token at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Revoked,
    Expired,
}

/// Server-side record of an issued refresh token
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub account_id: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(account_id: &str, token: String, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            token,
            expires_at,
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A record is valid iff it is not revoked and `now < expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Revocation wins over expiry when both hold.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.revoked {
            TokenState::Revoked
        } else if self.is_expired_at(now) {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }
}
