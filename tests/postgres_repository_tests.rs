//! PostgreSQL adapter tests
//!
//! Need a disposable database: set TEST_DATABASE_URL and run with
//! `cargo test -- --ignored`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use keygate::models::{generate_account_id, Account, RefreshTokenRecord};
use keygate::repository::{
    AccountRepository, PgAccountRepository, PgRefreshTokenRepository, RefreshTokenRepository,
    StorageError,
};

async fn pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect to test database");
    keygate::db::run_migrations(&pool)
        .await
        .expect("migrations run");
    pool
}

fn unique_email() -> String {
    format!("{}@test.example", generate_account_id().to_lowercase())
}

async fn seeded_account(accounts: &PgAccountRepository) -> Account {
    let account = Account::new(&unique_email(), "hash".to_string(), "Test");
    accounts.create(&account).await.unwrap();
    account
}

#[tokio::test]
#[ignore]
async fn test_account_crud_and_soft_delete() {
    let accounts = PgAccountRepository::new(pool().await);
    let account = seeded_account(&accounts).await;

    let found = accounts.find_by_email(&account.email).await.unwrap().unwrap();
    assert_eq!(found.id, account.id);

    let duplicate = Account::new(&account.email, "hash".to_string(), "Again");
    assert!(matches!(
        accounts.create(&duplicate).await,
        Err(StorageError::Duplicate(_))
    ));

    accounts.delete(&account.id).await.unwrap();
    assert!(accounts.find_by_id(&account.id).await.unwrap().is_none());
    assert!(accounts.find_by_email(&account.email).await.unwrap().is_none());
    assert!(matches!(
        accounts.delete(&account.id).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
#[ignore]
async fn test_refresh_token_revocation() {
    let pool = pool().await;
    let accounts = PgAccountRepository::new(pool.clone());
    let tokens = PgRefreshTokenRepository::new(pool);
    let account = seeded_account(&accounts).await;

    let expires_at = Utc::now() + Duration::days(7);
    for token in ["a", "b"] {
        let value = format!("{}-{}", account.id, token);
        tokens
            .create(&RefreshTokenRecord::new(&account.id, value, expires_at))
            .await
            .unwrap();
    }

    let first = format!("{}-a", account.id);
    assert!(tokens.revoke(&first).await.unwrap());
    assert!(!tokens.revoke(&first).await.unwrap());
    assert!(tokens.find_by_token(&first).await.unwrap().unwrap().revoked);

    assert_eq!(tokens.find_by_account_id(&account.id).await.unwrap().len(), 1);
    assert_eq!(tokens.revoke_all_by_account_id(&account.id).await.unwrap(), 1);
    assert!(tokens.find_by_account_id(&account.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_concurrent_rotation_has_one_winner() {
    let pool = pool().await;
    let accounts = PgAccountRepository::new(pool.clone());
    let tokens = Arc::new(PgRefreshTokenRepository::new(pool));
    let account = seeded_account(&accounts).await;

    let expires_at = Utc::now() + Duration::days(7);
    let presented = format!("{}-original", account.id);
    tokens
        .create(&RefreshTokenRecord::new(
            &account.id,
            presented.clone(),
            expires_at,
        ))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let tokens = tokens.clone();
        let presented = presented.clone();
        let replacement =
            RefreshTokenRecord::new(&account.id, format!("{}-r{}", account.id, i), expires_at);
        handles.push(tokio::spawn(async move {
            tokens.rotate(&presented, &replacement).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(tokens.find_by_account_id(&account.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_delete_expired() {
    let pool = pool().await;
    let accounts = PgAccountRepository::new(pool.clone());
    let tokens = PgRefreshTokenRepository::new(pool);
    let account = seeded_account(&accounts).await;

    let stale = format!("{}-stale", account.id);
    tokens
        .create(&RefreshTokenRecord::new(
            &account.id,
            stale.clone(),
            Utc::now() - Duration::minutes(5),
        ))
        .await
        .unwrap();

    // Expired at the instant of issue, same rule as the in-memory sweep
    let at_deadline = format!("{}-deadline", account.id);
    tokens
        .create(&RefreshTokenRecord::new(
            &account.id,
            at_deadline.clone(),
            Utc::now(),
        ))
        .await
        .unwrap();

    assert!(tokens.delete_expired().await.unwrap() >= 2);
    assert!(tokens.find_by_token(&stale).await.unwrap().is_none());
    assert!(tokens.find_by_token(&at_deadline).await.unwrap().is_none());
}
