//! Authentication configuration.
//!
//! All security policy knobs live here and are injected into the services at
//! construction time. Nothing reads process environment at call time, so the
//! core stays testable with explicit values.

use serde::{Deserialize, Serialize};
use std::env;

/// Development fallback signing secret. The server logs a warning when it is
/// still in use.
pub const DEV_JWT_SECRET: &str = "homehub-dev-secret-change-this";

/// Authentication and session policy.
///
/// Rotating `jwt_secret` invalidates every outstanding token; there is no
/// automatic migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Symmetric HS256 signing secret for access and refresh tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default 7 days).
    pub access_ttl_secs: i64,
    /// Refresh token and session lifetime in seconds (default 30 days).
    pub refresh_ttl_secs: i64,
    /// Consecutive failed logins before an account locks.
    pub lock_threshold: u32,
    /// How long a locked account stays locked, in seconds (default 15 min).
    pub lock_window_secs: i64,
    /// bcrypt cost factor for password hashes.
    pub bcrypt_cost: u32,
    /// Whether auth cookies are marked `Secure` (transmit over TLS only).
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string()),
            access_ttl_secs: 7 * 24 * 60 * 60,
            refresh_ttl_secs: 30 * 24 * 60 * 60,
            lock_threshold: 5,
            lock_window_secs: 15 * 60,
            bcrypt_cost: 12,
            secure_cookies: env::var("COOKIE_SECURE").map(|v| v == "true").unwrap_or(false),
        }
    }
}

impl AuthConfig {
    /// Create a config with an explicit secret and library defaults for
    /// everything else.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Default::default()
        }
    }

    /// Config for tests: explicit secret, minimal bcrypt cost so hashing
    /// doesn't dominate test runtime.
    pub fn for_tests() -> Self {
        Self {
            bcrypt_cost: 4,
            ..Self::with_secret("test-secret")
        }
    }

    /// Whether the process is running on the development fallback secret.
    pub fn using_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Access token lifetime as a chrono duration.
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_ttl_secs)
    }

    /// Refresh token / session lifetime as a chrono duration.
    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_ttl_secs)
    }

    /// Lock window as a chrono duration.
    pub fn lock_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = AuthConfig::with_secret("s");
        assert_eq!(config.access_ttl_secs, 604_800);
        assert_eq!(config.refresh_ttl_secs, 2_592_000);
        assert_eq!(config.lock_threshold, 5);
        assert_eq!(config.lock_window_secs, 900);
        assert_eq!(config.bcrypt_cost, 12);
    }

    #[test]
    fn test_with_secret() {
        let config = AuthConfig::with_secret("abc");
        assert_eq!(config.jwt_secret, "abc");
        assert!(!config.using_dev_secret());
    }

    #[test]
    fn test_durations() {
        let config = AuthConfig::with_secret("s");
        assert_eq!(config.access_ttl(), chrono::Duration::days(7));
        assert_eq!(config.refresh_ttl(), chrono::Duration::days(30));
        assert_eq!(config.lock_window(), chrono::Duration::minutes(15));
    }

    #[test]
    fn test_test_config_uses_cheap_hashing() {
        let config = AuthConfig::for_tests();
        assert!(config.bcrypt_cost < 12);
        assert_eq!(config.jwt_secret, "test-secret");
    }
}
