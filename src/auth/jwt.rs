//! RS256 access token issuance and validation
//!
//! Keys are loaded once from PEM material. The public half is published as a
//! JWK set so other services can verify access tokens without calling back.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Issuer written into every access token unless configured otherwise
pub const DEFAULT_ISSUER: &str = "auth-service";

/// JWT-related errors
///
/// Validation failures stay distinguishable here for logging; callers outside
/// the auth module only ever see a single invalid-token kind.
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Failed to read key file {path}: {reason}")]
    KeyFile { path: String, reason: String },

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Public key does not belong to the private key")]
    KeyMismatch,

    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signature mismatch")]
    InvalidSignature,

    #[error("Unexpected signing algorithm: {0}")]
    UnexpectedAlgorithm(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Invalid token claims: {0}")]
    InvalidClaims(String),
}

impl JwtError {
    /// True for failures caused by the presented token rather than by us
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            JwtError::Malformed(_)
                | JwtError::InvalidSignature
                | JwtError::UnexpectedAlgorithm(_)
                | JwtError::TokenExpired
                | JwtError::NotYetValid
                | JwtError::InvalidClaims(_)
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => JwtError::UnexpectedAlgorithm(err.to_string()),
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::ImmatureSignature => JwtError::NotYetValid,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::InvalidAudience
            | ErrorKind::MissingRequiredClaim(_) => JwtError::InvalidClaims(err.to_string()),
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub account_id: String,
    pub email: String,
    /// Issuer
    pub iss: String,
    /// Subject (account ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// A single RSA signing key in JWK form
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}

/// JSON Web Key Set
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl Jwk {
    fn from_public_key(key: &RsaPublicKey) -> Self {
        Self {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }
    }

    /// Build a verification key from the published modulus and exponent
    pub fn decoding_key(&self) -> Result<DecodingKey, JwtError> {
        DecodingKey::from_rsa_components(&self.n, &self.e)
            .map_err(|e| JwtError::InvalidPublicKey(e.to_string()))
    }
}

/// Signs and validates access tokens with a fixed RSA key pair
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    jwks: JwkSet,
    issuer: String,
    access_token_ttl: Duration,
}

impl JwtManager {
    /// Load the key pair from PEM files
    pub fn from_files(
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
        issuer: &str,
        access_token_ttl: Duration,
    ) -> Result<Self, JwtError> {
        let private_pem = read_key_file(private_key_path.as_ref())?;
        let public_pem = read_key_file(public_key_path.as_ref())?;
        Self::from_pem(&private_pem, &public_pem, issuer, access_token_ttl)
    }

    /// Build a manager from PEM-encoded keys
    ///
    /// The private key may be PKCS#1 or PKCS#8, the public key PKCS#1 or SPKI.
    pub fn from_pem(
        private_pem: &str,
        public_pem: &str,
        issuer: &str,
        access_token_ttl: Duration,
    ) -> Result<Self, JwtError> {
        let private_key = parse_private_key(private_pem)?;
        let public_key = parse_public_key(public_pem)?;

        if private_key.to_public_key() != public_key {
            return Err(JwtError::KeyMismatch);
        }

        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| JwtError::InvalidPrivateKey(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let jwk = Jwk::from_public_key(&public_key);
        let decoding_key = jwk.decoding_key()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            jwks: JwkSet { keys: vec![jwk] },
            issuer: issuer.to_string(),
            access_token_ttl,
        })
    }

    /// Generate a signed access token for an account
    pub fn issue_access_token(&self, account_id: &str, email: &str) -> Result<String, JwtError> {
        self.issue_access_token_at(account_id, email, Utc::now())
    }

    fn issue_access_token_at(
        &self,
        account_id: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let claims = Claims {
            account_id: account_id.to_string(),
            email: email.to_string(),
            iss: self.issuer.clone(),
            sub: account_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: now
                .checked_add_signed(self.access_token_ttl)
                .ok_or_else(|| {
                    JwtError::EncodingFailed("token expiry out of range".to_string())
                })?
                .timestamp(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify and decode an access token
    ///
    /// Tokens whose header names anything other than RS256 are rejected before
    /// the signature is looked at.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Public key in JWK set form; identical on every call
    pub fn public_key_set(&self) -> &JwkSet {
        &self.jwks
    }

    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }
}

fn read_key_file(path: &Path) -> Result<String, JwtError> {
    fs::read_to_string(path).map_err(|e| JwtError::KeyFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, JwtError> {
    if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| JwtError::InvalidPrivateKey(e.to_string()))
}

fn parse_public_key(pem: &str) -> Result<RsaPublicKey, JwtError> {
    if let Ok(key) = RsaPublicKey::from_pkcs1_pem(pem) {
        return Ok(key);
    }
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| JwtError::InvalidPublicKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/private_key.pem");
    const PRIVATE_KEY_PKCS1: &str = include_str!("../../tests/fixtures/private_key_pkcs1.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/public_key.pem");
    const PUBLIC_KEY_PKCS1: &str = include_str!("../../tests/fixtures/public_key_pkcs1.pem");
    const OTHER_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/other_private_key.pem");
    const OTHER_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/other_public_key.pem");
    const EC_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/ec_private_key.pem");

    fn create_test_manager() -> JwtManager {
        JwtManager::from_pem(PRIVATE_KEY, PUBLIC_KEY, DEFAULT_ISSUER, Duration::minutes(15))
            .unwrap()
    }

    #[test]
    fn test_issue_and_validate_access_token() {
        let manager = create_test_manager();
        let token = manager.issue_access_token("acc123", "a@x.com").unwrap();
        assert!(!token.is_empty());

        let claims = manager.validate_access_token(&token).unwrap();
        assert_eq!(claims.account_id, "acc123");
        assert_eq!(claims.sub, "acc123");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.nbf, claims.iat);
    }

    #[test]
    fn test_flipped_signature_byte() {
        let manager = create_test_manager();
        let token = manager.issue_access_token("acc123", "a@x.com").unwrap();

        let (signing_input, signature) = token.rsplit_once('.').unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(signature).unwrap();
        bytes[0] ^= 0x01;
        let tampered = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(bytes));

        let result = manager.validate_access_token(&tampered);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_expired_token() {
        let manager = create_test_manager();
        let issued_at = Utc::now() - Duration::hours(1);
        let token = manager
            .issue_access_token_at("acc123", "a@x.com", issued_at)
            .unwrap();

        let result = manager.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_not_yet_valid_token() {
        let manager = create_test_manager();
        let issued_at = Utc::now() + Duration::minutes(5);
        let token = manager
            .issue_access_token_at("acc123", "a@x.com", issued_at)
            .unwrap();

        let result = manager.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::NotYetValid)));
    }

    #[test]
    fn test_symmetric_algorithm_rejected() {
        let manager = create_test_manager();
        let now = Utc::now().timestamp();
        let claims = Claims {
            account_id: "acc123".to_string(),
            email: "a@x.com".to_string(),
            iss: DEFAULT_ISSUER.to_string(),
            sub: "acc123".to_string(),
            iat: now,
            nbf: now,
            exp: now + 900,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(PUBLIC_KEY.as_bytes()),
        )
        .unwrap();

        let result = manager.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::UnexpectedAlgorithm(_))));
    }

    #[test]
    fn test_malformed_token() {
        let manager = create_test_manager();
        let result = manager.validate_access_token("invalid.token.here");
        assert!(matches!(result, Err(JwtError::Malformed(_))));
        assert!(result.unwrap_err().is_validation_failure());
    }

    #[test]
    fn test_wrong_issuer() {
        let manager = create_test_manager();
        let other = JwtManager::from_pem(PRIVATE_KEY, PUBLIC_KEY, "someone-else", Duration::minutes(15))
            .unwrap();
        let token = other.issue_access_token("acc123", "a@x.com").unwrap();

        let result = manager.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::InvalidClaims(_))));
    }

    #[test]
    fn test_token_from_unrelated_key_rejected() {
        let manager = create_test_manager();
        let other = JwtManager::from_pem(
            OTHER_PRIVATE_KEY,
            OTHER_PUBLIC_KEY,
            DEFAULT_ISSUER,
            Duration::minutes(15),
        )
        .unwrap();
        let token = other.issue_access_token("acc123", "a@x.com").unwrap();

        let result = manager.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_public_key_set_shape() {
        let manager = create_test_manager();
        let jwks = manager.public_key_set();
        assert_eq!(jwks.keys.len(), 1);

        let jwk = &jwks.keys[0];
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.key_use, "sig");
        assert_eq!(jwk.alg, "RS256");
        assert_eq!(jwk.e, "AQAB");
        assert!(!jwk.n.contains('='));
        assert_eq!(URL_SAFE_NO_PAD.decode(&jwk.n).unwrap().len(), 256);

        let json = serde_json::to_value(jwks).unwrap();
        assert_eq!(json["keys"][0]["use"], "sig");
        assert_eq!(manager.public_key_set(), jwks);
    }

    #[test]
    fn test_pkcs1_encodings_accepted() {
        let manager = JwtManager::from_pem(
            PRIVATE_KEY_PKCS1,
            PUBLIC_KEY_PKCS1,
            DEFAULT_ISSUER,
            Duration::minutes(15),
        )
        .unwrap();
        assert_eq!(manager.public_key_set(), create_test_manager().public_key_set());
    }

    #[test]
    fn test_mismatched_keys() {
        let result = JwtManager::from_pem(
            PRIVATE_KEY,
            OTHER_PUBLIC_KEY,
            DEFAULT_ISSUER,
            Duration::minutes(15),
        );
        assert!(matches!(result, Err(JwtError::KeyMismatch)));
    }

    #[test]
    fn test_non_rsa_private_key() {
        let result =
            JwtManager::from_pem(EC_PRIVATE_KEY, PUBLIC_KEY, DEFAULT_ISSUER, Duration::minutes(15));
        assert!(matches!(result, Err(JwtError::InvalidPrivateKey(_))));
    }

    #[test]
    fn test_garbage_public_key() {
        let result = JwtManager::from_pem(
            PRIVATE_KEY,
            "-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----\n",
            DEFAULT_ISSUER,
            Duration::minutes(15),
        );
        assert!(matches!(result, Err(JwtError::InvalidPublicKey(_))));
    }

    #[test]
    fn test_missing_key_file() {
        let result = JwtManager::from_files(
            "/nonexistent/private_key.pem",
            "/nonexistent/public_key.pem",
            DEFAULT_ISSUER,
            Duration::minutes(15),
        );
        assert!(matches!(result, Err(JwtError::KeyFile { .. })));
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let manager =
            JwtManager::from_pem(PRIVATE_KEY, PUBLIC_KEY, DEFAULT_ISSUER, Duration::days(200_000_000))
                .unwrap();
        let result = manager.issue_access_token("acc123", "a@x.com");
        assert!(matches!(result, Err(JwtError::EncodingFailed(_))));
    }
}
