//! keygate server
//!
//! Issues and verifies sessions for password-authenticated accounts.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;

use keygate::auth::{expired_token_sweeper, AuthService, JwtManager, PasswordHasher};
use keygate::config::{Config, StorageBackend};
use keygate::db::{self, Database};
use keygate::middleware;
use keygate::repository::{
    AccountRepository, InMemoryAccountRepository, InMemoryRefreshTokenRepository,
    PgAccountRepository, PgRefreshTokenRepository, RefreshTokenRepository,
};
use keygate::routes::create_router;
use keygate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        storage = config.storage_backend.as_str(),
        "Starting keygate"
    );

    let (accounts, refresh_tokens, database): (
        Arc<dyn AccountRepository>,
        Arc<dyn RefreshTokenRepository>,
        Option<Database>,
    ) = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = db::create_pool(&config).await?;
            db::run_migrations(&pool).await?;
            (
                Arc::new(PgAccountRepository::new(pool.clone())),
                Arc::new(PgRefreshTokenRepository::new(pool.clone())),
                Some(Database::new(pool)),
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all accounts and sessions are lost on exit");
            (
                Arc::new(InMemoryAccountRepository::new()),
                Arc::new(InMemoryRefreshTokenRepository::new()),
                None,
            )
        }
    };

    let jwt = JwtManager::from_files(
        &config.jwt.private_key_path,
        &config.jwt.public_key_path,
        &config.jwt.issuer,
        config.jwt.access_token_ttl(),
    )
    .context("Failed to load signing keys")?;

    let auth_service = AuthService::new(
        accounts,
        refresh_tokens.clone(),
        Arc::new(jwt),
        config.jwt.refresh_token_ttl(),
        PasswordHasher::new(config.bcrypt_cost),
    )
    .context("Failed to initialize auth service")?;

    if config.token_cleanup_interval_seconds > 0 {
        let interval = std::time::Duration::from_secs(config.token_cleanup_interval_seconds);
        tokio::spawn(async move {
            expired_token_sweeper(refresh_tokens, interval).await;
        });
    }

    let app_state = AppState::new(Arc::new(auth_service), database, config.storage_backend);

    let mut app = create_router(app_state, config.cors_allowed_origins.as_deref());
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
