//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;

use keygate::auth::{AuthService, JwtManager, PasswordHasher, DEFAULT_ISSUER};
use keygate::config::StorageBackend;
use keygate::repository::{InMemoryAccountRepository, InMemoryRefreshTokenRepository};
use keygate::state::AppState;

pub const PRIVATE_KEY: &str = include_str!("../fixtures/private_key.pem");
pub const PUBLIC_KEY: &str = include_str!("../fixtures/public_key.pem");
pub const OTHER_PUBLIC_KEY: &str = include_str!("../fixtures/other_public_key.pem");

/// Lowest cost bcrypt accepts; keeps the suite fast
pub const TEST_BCRYPT_COST: u32 = 4;

pub struct TestContext {
    pub service: Arc<AuthService>,
    pub accounts: Arc<InMemoryAccountRepository>,
    pub refresh_tokens: Arc<InMemoryRefreshTokenRepository>,
}

pub fn jwt_manager() -> JwtManager {
    JwtManager::from_pem(PRIVATE_KEY, PUBLIC_KEY, DEFAULT_ISSUER, Duration::seconds(900))
        .expect("fixture keys load")
}

pub fn test_context() -> TestContext {
    let accounts = Arc::new(InMemoryAccountRepository::new());
    let refresh_tokens = Arc::new(InMemoryRefreshTokenRepository::new());

    let service = AuthService::new(
        accounts.clone(),
        refresh_tokens.clone(),
        Arc::new(jwt_manager()),
        Duration::days(7),
        PasswordHasher::new(TEST_BCRYPT_COST),
    )
    .expect("auth service builds");

    TestContext {
        service: Arc::new(service),
        accounts,
        refresh_tokens,
    }
}

pub fn test_state(ctx: &TestContext) -> AppState {
    AppState::new(ctx.service.clone(), None, StorageBackend::Memory)
}
