//! Periodic purge of expired refresh tokens
//!
//! Storage hygiene only; nothing depends on expired rows being gone.

use std::sync::Arc;
use std::time::Duration;

use crate::repository::{RefreshTokenRepository, StorageError};

/// Delete expired refresh tokens once
pub async fn sweep_expired_tokens(
    refresh_tokens: &dyn RefreshTokenRepository,
) -> Result<u64, StorageError> {
    let purged = refresh_tokens.delete_expired().await?;
    if purged > 0 {
        tracing::info!(purged, "Expired refresh tokens purged");
    }
    Ok(purged)
}

/// Run the sweep forever at a fixed interval
pub async fn expired_token_sweeper(
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    interval: Duration,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting expired token sweeper");

    loop {
        tokio::time::sleep(interval).await;

        if let Err(e) = sweep_expired_tokens(refresh_tokens.as_ref()).await {
            tracing::error!("Error purging expired refresh tokens: {}", e);
        }
    }
}
