//! Credential storage: user records, password hashes, lockout state.
//!
//! Owns everything about "is this password right for this account" and
//! nothing about HTTP or tokens. All counter mutations are single UPDATE
//! statements so concurrent failed logins against one account are both
//! recorded; nothing here does read-modify-write in application memory.

use anyhow::Result;
use surrealdb::RecordId;
use surrealdb::sql::Datetime;

use crate::config::AuthConfig;
use crate::db::{Db, UserCreate, UserRecord, UserRole};
use crate::auth::error::AuthError;

/// Username shape accepted at the account boundary: 3-50 chars drawn from
/// letters, digits and underscore.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.len() < 3 || username.len() > 50 {
        return Err(AuthError::Validation(
            "username must be 3-50 characters".to_string(),
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AuthError::Validation(
            "username may only contain letters, digits and underscore".to_string(),
        ));
    }
    Ok(())
}

/// Store for user accounts and their lockout state.
pub struct CredentialStore {
    db: Db,
    lock_threshold: u32,
    lock_window: chrono::Duration,
    bcrypt_cost: u32,
    /// Verified against when a login names an unknown user, so the unknown
    /// and wrong-password paths burn the same hashing cost.
    reference_hash: String,
}

impl CredentialStore {
    /// Create a new credential store.
    ///
    /// The timing-equalization reference hash is computed once here with the
    /// same cost parameters as real password hashes.
    pub fn new(db: Db, config: &AuthConfig) -> Result<Self> {
        let reference_hash = bcrypt::hash("reference-password", config.bcrypt_cost)?;

        Ok(Self {
            db,
            lock_threshold: config.lock_threshold,
            lock_window: config.lock_window(),
            bcrypt_cost: config.bcrypt_cost,
            reference_hash,
        })
    }

    /// Look a user up by login name.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let mut res = self
            .db
            .query("SELECT * FROM user WHERE username = $username LIMIT 1")
            .bind(("username", username.to_string()))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(users.into_iter().next())
    }

    /// Look a user up by record id.
    pub async fn find_by_id(&self, user_id: &RecordId) -> Result<Option<UserRecord>, AuthError> {
        let mut res = self
            .db
            .query("SELECT * FROM user WHERE id = $id LIMIT 1")
            .bind(("id", user_id.clone()))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(users.into_iter().next())
    }

    /// Create a new user account with a freshly hashed password.
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
        display_name: Option<String>,
        role: UserRole,
    ) -> Result<UserRecord, AuthError> {
        validate_username(username)?;

        if self.find_by_username(username).await?.is_some() {
            return Err(AuthError::Conflict(
                "username is already taken".to_string(),
            ));
        }

        if let Some(ref email) = email
            && self.find_by_email(email).await?.is_some()
        {
            return Err(AuthError::Conflict("email is already in use".to_string()));
        }

        let password_hash =
            bcrypt::hash(password, self.bcrypt_cost).map_err(AuthError::database)?;

        let create = UserCreate {
            username: username.to_string(),
            password_hash,
            email,
            display_name,
            role,
        };

        let mut res = self
            .db
            .query(
                r#"
                CREATE user CONTENT {
                    username: $username,
                    password_hash: $password_hash,
                    email: $email,
                    display_name: $display_name,
                    role: $role,
                    is_active: true,
                    failed_attempts: 0
                }
                "#,
            )
            .bind(("username", create.username))
            .bind(("password_hash", create.password_hash))
            .bind(("email", create.email))
            .bind(("display_name", create.display_name))
            .bind(("role", create.role))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(0).map_err(AuthError::database)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::database("failed to create user"))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let mut res = self
            .db
            .query("SELECT * FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email.to_string()))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(users.into_iter().next())
    }

    /// Check a candidate password against a user's stored hash.
    ///
    /// Always performs the full bcrypt comparison; callers must not
    /// short-circuit around it based on account state.
    pub fn verify_password(&self, user: &UserRecord, candidate: &str) -> Result<bool, AuthError> {
        bcrypt::verify(candidate, &user.password_hash).map_err(AuthError::database)
    }

    /// Burn a password verification against the reference hash.
    ///
    /// Called when login names an unknown user so that the wall-clock cost
    /// of "unknown user" and "known user, wrong password" match.
    pub fn dummy_verify(&self, candidate: &str) {
        let _ = bcrypt::verify(candidate, &self.reference_hash);
    }

    /// Record a failed login attempt.
    ///
    /// A single UPDATE: the increment and the conditional lock are evaluated
    /// atomically per row, so two concurrent failures both count. The lock
    /// engages once the post-increment counter reaches the threshold.
    pub async fn record_failed_attempt(&self, user_id: &RecordId) -> Result<UserRecord, AuthError> {
        let locked_until = Datetime::from(chrono::Utc::now() + self.lock_window);

        let mut res = self
            .db
            .query(
                r#"
                UPDATE user SET
                    failed_attempts += 1,
                    last_failed_at = time::now(),
                    locked_until = (IF failed_attempts >= $threshold { $locked_until } ELSE { locked_until }),
                    updated_at = time::now()
                WHERE id = $id
                "#,
            )
            .bind(("id", user_id.clone()))
            .bind(("threshold", self.lock_threshold as i64))
            .bind(("locked_until", locked_until))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(0).map_err(AuthError::database)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))
    }

    /// Record a successful login: reset the failure counter, clear any lock,
    /// stamp the login time.
    pub async fn record_success(&self, user_id: &RecordId) -> Result<UserRecord, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                UPDATE user SET
                    failed_attempts = 0,
                    last_failed_at = NONE,
                    locked_until = NONE,
                    last_login_at = time::now(),
                    updated_at = time::now()
                WHERE id = $id
                "#,
            )
            .bind(("id", user_id.clone()))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(0).map_err(AuthError::database)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))
    }

    /// Whether the account is currently locked.
    ///
    /// Lazy expiry: an elapsed lock is cleared here as a side effect, so no
    /// background sweep is needed for lock state.
    pub async fn is_locked(&self, user: &UserRecord) -> Result<bool, AuthError> {
        if user.locked_until.is_none() {
            return Ok(false);
        }

        let mut res = self
            .db
            .query(
                r#"
                UPDATE user SET
                    locked_until = NONE,
                    failed_attempts = 0,
                    last_failed_at = NONE,
                    updated_at = time::now()
                WHERE id = $id AND locked_until != NONE AND locked_until <= time::now();
                SELECT * FROM user WHERE id = $id LIMIT 1;
                "#,
            )
            .bind(("id", user.id.clone()))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(1).map_err(AuthError::database)?;
        let refreshed = users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

        Ok(refreshed.locked_until.is_some())
    }

    /// Replace the stored password hash.
    pub async fn change_password(
        &self,
        user_id: &RecordId,
        new_password: &str,
    ) -> Result<UserRecord, AuthError> {
        let password_hash =
            bcrypt::hash(new_password, self.bcrypt_cost).map_err(AuthError::database)?;

        let mut res = self
            .db
            .query(
                r#"
                UPDATE user SET
                    password_hash = $password_hash,
                    updated_at = time::now()
                WHERE id = $id
                "#,
            )
            .bind(("id", user_id.clone()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(AuthError::database)?;

        let users: Vec<UserRecord> = res.take(0).map_err(AuthError::database)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))
    }
}
