//! Authentication and session-security core.
//!
//! This module owns credential verification, brute-force lockout, the
//! signed-token lifecycle, and the audit trail. Everything else in the
//! console (container control, file browsing, metrics) consumes it through
//! two surfaces: the [`AuthService`] operations and the request-gating
//! [`middleware`].
//!
//! ## Security Model
//!
//! - Credential failures are generic-worded and timing-equalized: unknown
//!   username and wrong password are indistinguishable from outside.
//! - Accounts lock for 15 minutes after 5 consecutive failures, counted per
//!   account (an attacker rotating usernames is an accepted limitation).
//! - Tokens are HS256-signed; a token is only honored while its backing
//!   session row is active and unexpired, so revocation is immediate.
//! - Refresh tokens rotate: each one is single-use.
//! - Every security-relevant event lands in the append-only audit log
//!   before the operation returns.
//!
//! ## Usage
//!
//! ```ignore
//! let auth = AuthService::new(db, &AuthConfig::default())?;
//! let login = auth.login("admin", password, ip, user_agent).await?;
//!
//! // Gate a router with it:
//! router.route_layer(middleware::from_fn_with_state(auth, authenticate))
//! ```

mod audit;
mod credentials;
mod error;
pub mod middleware;
mod sessions;
mod service;
mod tokens;

pub use audit::AuditLog;
pub use credentials::{CredentialStore, validate_username};
pub use error::{AuthError, GENERIC_CREDENTIALS_MSG, GENERIC_SESSION_MSG};
pub use middleware::{ACCESS_COOKIE, Identity, REFRESH_COOKIE, authenticate, authorize};
pub use sessions::SessionStore;
pub use service::{AuthService, LoginResponse, UserProfile};
pub use tokens::{AccessClaims, RefreshClaims, TokenCodec, TokenError};
