//! Opaque refresh token generation

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes per refresh token (256 bits)
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate a cryptographically secure refresh token, hex-encoded
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues refresh token values and their expiry
#[derive(Debug, Clone, Copy)]
pub struct RefreshTokenIssuer {
    ttl: Duration,
}

impl RefreshTokenIssuer {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Returns the token value and when it stops being redeemable.
    /// The caller owns persisting it.
    ///
    /// `None` when the expiry falls outside the representable time range.
    pub fn issue(&self, account_id: &str) -> Option<(String, DateTime<Utc>)> {
        let expires_at = Utc::now().checked_add_signed(self.ttl)?;
        let token = generate_refresh_token();
        tracing::trace!(account_id = %account_id, expires_at = %expires_at, "Refresh token generated");
        Some((token, expires_at))
    }
}
