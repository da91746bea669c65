//! Password hashing and verification
//!
//! bcrypt output embeds its salt and cost, so a stored hash is self-describing.

use thiserror::Error;

/// Password hashing errors
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Malformed password hash: {0}")]
    MalformedHash(String),
}

/// bcrypt cost used when none is configured
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Salted, deliberately slow password hasher
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        bcrypt::hash(password, self.cost).map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Check a password against a stored hash
    ///
    /// # Returns
    /// * `Ok(false)` on mismatch
    /// * `Err(PasswordError::MalformedHash)` if the stored hash cannot be parsed
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        bcrypt::verify(password, hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("pw123456").unwrap();

        assert_ne!(hash, "pw123456");
        assert!(hasher.verify("pw123456", &hash).unwrap());
        assert!(!hasher.verify("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = fast_hasher();
        let first = hasher.hash("pw123456").unwrap();
        let second = hasher.hash("pw123456").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_embeds_cost() {
        let hash = fast_hasher().hash("pw123456").unwrap();
        assert!(hash.starts_with("$2b$04$"));
    }

    #[test]
    fn test_malformed_hash() {
        let result = fast_hasher().verify("pw123456", "not-a-bcrypt-hash");
        assert!(matches!(result, Err(PasswordError::MalformedHash(_))));
    }
}
