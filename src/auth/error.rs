//! Error taxonomy for the auth core.
//!
//! Operational errors (bad credentials, locked accounts, policy violations)
//! carry stable machine-readable codes and are safe to return to callers.
//! Anything else is a `Database` error: logged with full detail server-side
//! and surfaced as a generic failure.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use std::fmt;
use tracing::error;

/// Wording shared by every credential failure. Unknown-user, inactive-account
/// and wrong-password paths must be indistinguishable at the API surface.
pub const GENERIC_CREDENTIALS_MSG: &str = "invalid username or password";

/// Wording for every token/session rejection at the request gate. Expired,
/// malformed, bad-signature and revoked all read the same to the caller.
pub const GENERIC_SESSION_MSG: &str = "invalid or expired session";

/// Errors returned by the auth core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bad, missing or expired credentials or token. Always generic-worded.
    Authentication(String),
    /// Authenticated, but the role does not permit the operation.
    Authorization,
    /// Account locked after too many failed attempts.
    TooManyAttempts,
    /// Input failed validation (password policy, malformed request).
    Validation(String),
    /// Duplicate username or email.
    Conflict(String),
    /// User or session absent where identity is already established.
    NotFound(String),
    /// Datastore failure. Non-operational; detail never reaches the caller.
    Database(String),
}

impl AuthError {
    /// Credential failure with the uniform generic wording.
    pub fn credentials() -> Self {
        Self::Authentication(GENERIC_CREDENTIALS_MSG.to_string())
    }

    /// Token/session rejection with the uniform generic wording.
    pub fn session() -> Self {
        Self::Authentication(GENERIC_SESSION_MSG.to_string())
    }

    /// Wrap a datastore failure.
    pub fn database(err: impl fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Authorization => "AUTHORIZATION_ERROR",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT_ERROR",
            Self::NotFound(_) => "NOT_FOUND_ERROR",
            Self::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::TooManyAttempts => StatusCode::LOCKED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this is an expected, caller-reportable condition.
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Database(_))
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication(msg) => write!(f, "{}", msg),
            Self::Authorization => write!(f, "insufficient permissions"),
            Self::TooManyAttempts => {
                write!(f, "account locked, try again later")
            }
            Self::Validation(msg) => write!(f, "{}", msg),
            Self::Conflict(msg) => write!(f, "{}", msg),
            Self::NotFound(msg) => write!(f, "{}", msg),
            Self::Database(msg) => write!(f, "database error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Non-operational detail stays in the server log.
        let message = if self.is_operational() {
            self.to_string()
        } else {
            error!("internal error serving auth request: {}", self);
            "internal server error".to_string()
        };

        let body = Json(serde_json::json!({
            "success": false,
            "code": self.code(),
            "error": message,
        }));

        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::credentials().status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Authorization.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::TooManyAttempts.status_code(), StatusCode::LOCKED);
        assert_eq!(
            AuthError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AuthError::database("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_generic_wording_is_uniform() {
        // The whole point: both constructors produce fixed strings.
        assert_eq!(AuthError::credentials(), AuthError::credentials());
        assert_eq!(AuthError::credentials().to_string(), GENERIC_CREDENTIALS_MSG);
        assert_eq!(AuthError::session().to_string(), GENERIC_SESSION_MSG);
    }

    #[test]
    fn test_operational_split() {
        assert!(AuthError::credentials().is_operational());
        assert!(AuthError::TooManyAttempts.is_operational());
        assert!(!AuthError::database("boom").is_operational());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AuthError::credentials().code(), "AUTHENTICATION_ERROR");
        assert_eq!(AuthError::Authorization.code(), "AUTHORIZATION_ERROR");
        assert_eq!(AuthError::TooManyAttempts.code(), "TOO_MANY_ATTEMPTS");
        assert_eq!(AuthError::database("boom").code(), "INTERNAL_ERROR");
    }
}
