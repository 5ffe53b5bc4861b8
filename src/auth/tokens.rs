//! Stateless signer/verifier for access and refresh tokens.
//!
//! HS256 with a symmetric secret injected at construction. Pure: no I/O, no
//! shared mutable state, safe to call from any number of tasks concurrently.
//! Rotating the secret invalidates every outstanding token.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::AuthConfig;
use crate::db::UserRole;
use crate::types::{AccessToken, RefreshToken};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User record id
    pub sub: String,
    /// Login name at issue time
    pub username: String,
    /// Role at issue time
    pub role: UserRole,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Claims carried by a refresh token. Deliberately minimal: rotation looks
/// the session up by the token string, the claims only gate expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User record id
    pub sub: String,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Token verification/issuance failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token was valid once but its expiry has passed.
    Expired,
    /// Token is not a well-formed signed token.
    Malformed,
    /// Token is well-formed but the signature does not verify.
    BadSignature,
    /// Signing failed while issuing a token.
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "token expired"),
            Self::Malformed => write!(f, "malformed token"),
            Self::BadSignature => write!(f, "bad token signature"),
            Self::Signing(msg) => write!(f, "token signing failed: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

/// Signer/verifier for the compact token pair.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenCodec {
    /// Build a codec from the injected configuration. Keys are derived once
    /// here and never change for the life of the process.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No clock tolerance: an expired token is expired.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
        }
    }

    /// Issue an access token bound to a user identity.
    pub fn issue_access_token(
        &self,
        user_id: &str,
        username: &str,
        role: UserRole,
    ) -> Result<AccessToken, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map(AccessToken::new)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Issue a refresh token bound to a user id.
    pub fn issue_refresh_token(&self, user_id: &str) -> Result<RefreshToken, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map(RefreshToken::new)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify an access token and return its claims.
    pub fn verify_access(&self, token: &AccessToken) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token.as_str(), &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Verify a refresh token and return its claims.
    pub fn verify_refresh(&self, token: &RefreshToken) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token.as_str(), &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed,
    }
}
