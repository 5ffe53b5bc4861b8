use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::{RecordId, sql::Datetime};

use crate::types::{AccessToken, RefreshToken};

/// Role attached to a user account.
///
/// A closed enum rather than an open string so that authorization gates can
/// be checked exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full administrative access to the console.
    Admin,
    /// Regular account; no access to admin-gated surfaces.
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Persisted user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Database identifier
    pub id: RecordId,
    /// Unique, case-sensitive login name
    pub username: String,
    /// Salted bcrypt hash of the password
    pub password_hash: String,
    /// Optional contact email
    pub email: Option<String>,
    /// Optional display name
    pub display_name: Option<String>,
    /// Account role
    pub role: UserRole,
    /// Soft-deactivation flag; accounts are never physically deleted
    pub is_active: bool,
    /// Consecutive failed login attempts since the last success
    pub failed_attempts: u32,
    /// When the most recent failed attempt happened
    pub last_failed_at: Option<Datetime>,
    /// Lock expiry; the account is locked while this is set and in the future
    pub locked_until: Option<Datetime>,
    /// When the user last logged in successfully
    pub last_login_at: Option<Datetime>,
    /// When the account was created
    pub created_at: Option<Datetime>,
    /// Last update time
    pub updated_at: Option<Datetime>,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: UserRole,
}

/// Persisted session row binding a token pair to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Database identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Access token issued for this session
    pub access_token: AccessToken,
    /// Refresh token issued for this session
    pub refresh_token: RefreshToken,
    /// Client IP at creation time
    pub ip_address: Option<String>,
    /// Client user agent at creation time
    pub user_agent: Option<String>,
    /// A session is usable only while active and unexpired
    pub is_active: bool,
    /// Hard expiry; set to creation time + refresh TTL
    pub expires_at: Datetime,
    /// Updated on every authenticated request
    pub last_activity_at: Option<Datetime>,
    /// When the session was created
    pub created_at: Option<Datetime>,
}

/// Payload for creating a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreate {
    pub user_id: RecordId,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: Datetime,
}

/// Security-relevant actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Successful login
    LoginSuccess,
    /// Failed login (reason in detail)
    LoginFailed,
    /// Session terminated by the user
    Logout,
    /// Password changed successfully
    PasswordChanged,
    /// Password change rejected (reason in detail)
    PasswordChangeFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailed => "login_failed",
            Self::Logout => "logout",
            Self::PasswordChanged => "password_changed",
            Self::PasswordChangeFailed => "password_change_failed",
        }
    }
}

/// Persisted audit log entry. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    /// Database identifier
    pub id: RecordId,
    /// Acting user; None when the actor could not be identified
    pub user_id: Option<String>,
    /// The action that was performed
    pub action: String,
    /// Structured reason code and context
    pub detail: Option<Value>,
    /// Client IP address
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Whether the triggering operation succeeded
    pub success: bool,
    /// When the event occurred
    pub created_at: Option<Datetime>,
}

/// Payload for appending an audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogCreate {
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub detail: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
}
