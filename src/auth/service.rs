//! Authentication orchestration: login, logout, refresh, password change.
//!
//! The only component with real business logic; everything else is a store
//! or a pure codec. Every security-relevant outcome writes an audit entry
//! before the result is returned to the caller, and every credential
//! failure surfaces with identical wording so the failure reason is never
//! inferable from the API.

use anyhow::Result;
use serde::Serialize;
use surrealdb::RecordId;
use surrealdb::sql::Datetime;
use tracing::info;

use crate::auth::audit::AuditLog;
use crate::auth::credentials::CredentialStore;
use crate::auth::error::AuthError;
use crate::auth::sessions::SessionStore;
use crate::auth::tokens::TokenCodec;
use crate::config::AuthConfig;
use crate::db::{AuditAction, AuditLogCreate, Db, SessionCreate, UserRecord, UserRole};
use crate::types::{AccessToken, RefreshToken};

/// Caller-safe projection of a user record. Never carries the hash or the
/// lockout counters.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<Datetime>,
    pub created_at: Option<Datetime>,
}

impl From<UserRecord> for UserProfile {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

/// Minimum length accepted by the password policy.
const MIN_PASSWORD_LEN: usize = 8;

/// New-password policy: length, one uppercase, one digit.
fn validate_password_policy(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AuthError::Validation(
            "password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation(
            "password must contain at least one digit".to_string(),
        ));
    }
    Ok(())
}

/// Orchestrates the credential store, session store, token codec and audit
/// log behind one contract.
pub struct AuthService {
    credentials: CredentialStore,
    sessions: SessionStore,
    audit: AuditLog,
    tokens: TokenCodec,
    refresh_ttl: chrono::Duration,
}

impl AuthService {
    /// Wire up the service over one database handle and an injected config.
    pub fn new(db: Db, config: &AuthConfig) -> Result<Self> {
        Ok(Self {
            credentials: CredentialStore::new(db.clone(), config)?,
            sessions: SessionStore::new(db.clone()),
            audit: AuditLog::new(db),
            tokens: TokenCodec::new(config),
            refresh_ttl: config.refresh_ttl(),
        })
    }

    /// The credential store backing this service.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// The session store backing this service.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The audit log backing this service.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// The token codec backing this service.
    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Attempt a login.
    ///
    /// Unknown user, inactive account and wrong password all fail with the
    /// same wording and the same status; only the audit trail records which
    /// it was. A locked account fails distinctly (the lock itself is not a
    /// secret) and does not advance the failure counter.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<LoginResponse, AuthError> {
        let user = self.credentials.find_by_username(username).await?;

        let Some(user) = user else {
            // Burn the same hashing cost as a real verification so unknown
            // usernames are not detectable by response time.
            self.credentials.dummy_verify(password);

            self.audit
                .append(AuditLogCreate {
                    user_id: None,
                    action: AuditAction::LoginFailed,
                    detail: Some(serde_json::json!({
                        "reason": "user_not_found",
                        "username": username,
                    })),
                    ip_address,
                    user_agent,
                    success: false,
                })
                .await;

            return Err(AuthError::credentials());
        };

        if !user.is_active {
            self.audit
                .append(AuditLogCreate {
                    user_id: Some(user.id.to_string()),
                    action: AuditAction::LoginFailed,
                    detail: Some(serde_json::json!({"reason": "account_inactive"})),
                    ip_address,
                    user_agent,
                    success: false,
                })
                .await;

            return Err(AuthError::credentials());
        }

        if self.credentials.is_locked(&user).await? {
            self.audit
                .append(AuditLogCreate {
                    user_id: Some(user.id.to_string()),
                    action: AuditAction::LoginFailed,
                    detail: Some(serde_json::json!({"reason": "account_locked"})),
                    ip_address,
                    user_agent,
                    success: false,
                })
                .await;

            return Err(AuthError::TooManyAttempts);
        }

        if !self.credentials.verify_password(&user, password)? {
            self.credentials.record_failed_attempt(&user.id).await?;

            self.audit
                .append(AuditLogCreate {
                    user_id: Some(user.id.to_string()),
                    action: AuditAction::LoginFailed,
                    detail: Some(serde_json::json!({"reason": "bad_password"})),
                    ip_address,
                    user_agent,
                    success: false,
                })
                .await;

            return Err(AuthError::credentials());
        }

        let user = self.credentials.record_success(&user.id).await?;

        let response = self
            .open_session(&user, ip_address.clone(), user_agent.clone())
            .await?;

        self.audit
            .append(AuditLogCreate {
                user_id: Some(user.id.to_string()),
                action: AuditAction::LoginSuccess,
                detail: None,
                ip_address: ip_address.clone(),
                user_agent,
                success: true,
            })
            .await;

        info!(
            user_id = %user.id,
            username = %user.username,
            ip = ip_address.as_deref(),
            "login succeeded"
        );

        Ok(response)
    }

    /// Terminate the session carrying an access token. Idempotent: logging
    /// out an already-retired session is a no-op.
    pub async fn logout(
        &self,
        access_token: &AccessToken,
        user_id: &str,
        ip_address: Option<String>,
    ) -> Result<(), AuthError> {
        if let Some(session) = self.sessions.find_by_access_token(access_token).await? {
            self.sessions.deactivate(&session.id).await?;
        }

        self.audit
            .append(AuditLogCreate {
                user_id: Some(user_id.to_string()),
                action: AuditAction::Logout,
                detail: None,
                ip_address: ip_address.clone(),
                user_agent: None,
                success: true,
            })
            .await;

        info!(user_id, ip = ip_address.as_deref(), "logout");

        Ok(())
    }

    /// Rotate a refresh token: retire its session and mint a fresh pair.
    ///
    /// A rotated refresh token is single-use; presenting it again fails
    /// because its session is no longer active.
    pub async fn refresh(&self, refresh_token: &RefreshToken) -> Result<LoginResponse, AuthError> {
        self.tokens
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::session())?;

        let session = self
            .sessions
            .find_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(AuthError::session)?;

        let user = self
            .credentials
            .find_by_id(&session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(AuthError::session)?;

        self.sessions.deactivate(&session.id).await?;

        self.open_session(&user, session.ip_address, session.user_agent)
            .await
    }

    /// Change a user's password and retire every session they own.
    pub async fn change_password(
        &self,
        user_id: &RecordId,
        old_password: &str,
        new_password: &str,
        ip_address: Option<String>,
    ) -> Result<(), AuthError> {
        let user = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

        if !self.credentials.verify_password(&user, old_password)? {
            self.audit
                .append(AuditLogCreate {
                    user_id: Some(user.id.to_string()),
                    action: AuditAction::PasswordChangeFailed,
                    detail: Some(serde_json::json!({"reason": "bad_old_password"})),
                    ip_address,
                    user_agent: None,
                    success: false,
                })
                .await;

            return Err(AuthError::credentials());
        }

        validate_password_policy(new_password)?;

        if self.credentials.verify_password(&user, new_password)? {
            return Err(AuthError::Validation(
                "new password must differ from the current password".to_string(),
            ));
        }

        self.credentials.change_password(&user.id, new_password).await?;

        // Force re-login on every device.
        self.sessions.deactivate_all_for_user(&user.id).await?;

        self.audit
            .append(AuditLogCreate {
                user_id: Some(user.id.to_string()),
                action: AuditAction::PasswordChanged,
                detail: None,
                ip_address: ip_address.clone(),
                user_agent: None,
                success: true,
            })
            .await;

        info!(user_id = %user.id, ip = ip_address.as_deref(), "password changed");

        Ok(())
    }

    /// Mint a token pair and persist the session row backing it.
    async fn open_session(
        &self,
        user: &UserRecord,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<LoginResponse, AuthError> {
        let user_id = user.id.to_string();

        let access_token = self
            .tokens
            .issue_access_token(&user_id, &user.username, user.role)
            .map_err(AuthError::database)?;
        let refresh_token = self
            .tokens
            .issue_refresh_token(&user_id)
            .map_err(AuthError::database)?;

        self.sessions
            .create(SessionCreate {
                user_id: user.id.clone(),
                access_token: access_token.clone(),
                refresh_token: refresh_token.clone(),
                ip_address,
                user_agent,
                expires_at: Datetime::from(chrono::Utc::now() + self.refresh_ttl),
            })
            .await?;

        Ok(LoginResponse {
            user: user.clone().into(),
            access_token,
            refresh_token,
        })
    }
}
