//! Session storage: token pair ↔ user ↔ expiry ↔ activity.
//!
//! Sessions are retired by flipping `is_active`, never deleted, so every
//! deactivation path (logout, rotation, password change, expiry sweep) is
//! idempotent and safe to race.

use surrealdb::RecordId;

use crate::auth::error::AuthError;
use crate::db::{Db, SessionCreate, SessionRecord};
use crate::types::{AccessToken, RefreshToken};

/// Store for session rows.
#[derive(Clone)]
pub struct SessionStore {
    db: Db,
}

impl SessionStore {
    /// Create a new session store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Persist a new session.
    pub async fn create(&self, create: SessionCreate) -> Result<SessionRecord, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                CREATE session CONTENT {
                    user_id: $user_id,
                    access_token: $access_token,
                    refresh_token: $refresh_token,
                    ip_address: $ip_address,
                    user_agent: $user_agent,
                    is_active: true,
                    expires_at: $expires_at,
                    last_activity_at: time::now()
                }
                "#,
            )
            .bind(("user_id", create.user_id))
            .bind(("access_token", create.access_token))
            .bind(("refresh_token", create.refresh_token))
            .bind(("ip_address", create.ip_address))
            .bind(("user_agent", create.user_agent))
            .bind(("expires_at", create.expires_at))
            .await
            .map_err(AuthError::database)?;

        let sessions: Vec<SessionRecord> = res.take(0).map_err(AuthError::database)?;
        sessions
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::database("failed to create session"))
    }

    /// Find the live session carrying an access token.
    ///
    /// Only active, unexpired sessions match; the expiry comparison happens
    /// in the datastore so readers never race a stale clock.
    pub async fn find_by_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<SessionRecord>, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT * FROM session
                WHERE access_token = $tok
                  AND is_active = true
                  AND expires_at > time::now()
                LIMIT 1
                "#,
            )
            .bind(("tok", token.clone()))
            .await
            .map_err(AuthError::database)?;

        let sessions: Vec<SessionRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(sessions.into_iter().next())
    }

    /// Find the live session carrying a refresh token.
    pub async fn find_by_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<Option<SessionRecord>, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT * FROM session
                WHERE refresh_token = $tok
                  AND is_active = true
                  AND expires_at > time::now()
                LIMIT 1
                "#,
            )
            .bind(("tok", token.clone()))
            .await
            .map_err(AuthError::database)?;

        let sessions: Vec<SessionRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(sessions.into_iter().next())
    }

    /// Active sessions for one user, most recent activity first.
    pub async fn active_for_user(
        &self,
        user_id: &RecordId,
    ) -> Result<Vec<SessionRecord>, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT * FROM session
                WHERE user_id = $user_id AND is_active = true
                ORDER BY last_activity_at DESC
                "#,
            )
            .bind(("user_id", user_id.clone()))
            .await
            .map_err(AuthError::database)?;

        let sessions: Vec<SessionRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(sessions)
    }

    /// Retire one session. Idempotent.
    pub async fn deactivate(&self, session_id: &RecordId) -> Result<(), AuthError> {
        self.db
            .query("UPDATE session SET is_active = false WHERE id = $id")
            .bind(("id", session_id.clone()))
            .await
            .map_err(AuthError::database)?;

        Ok(())
    }

    /// Retire every active session a user owns, in one bulk update.
    pub async fn deactivate_all_for_user(&self, user_id: &RecordId) -> Result<(), AuthError> {
        self.db
            .query("UPDATE session SET is_active = false WHERE user_id = $user_id AND is_active = true")
            .bind(("user_id", user_id.clone()))
            .await
            .map_err(AuthError::database)?;

        Ok(())
    }

    /// Stamp the session's last activity time.
    pub async fn touch_activity(&self, session_id: &RecordId) -> Result<(), AuthError> {
        self.db
            .query("UPDATE session SET last_activity_at = time::now() WHERE id = $id")
            .bind(("id", session_id.clone()))
            .await
            .map_err(AuthError::database)?;

        Ok(())
    }

    /// Bulk-retire sessions past their expiry. Returns how many were swept.
    ///
    /// Runs on a periodic timer outside the request path; racing a login or
    /// refresh is harmless because deactivation is idempotent.
    pub async fn sweep_expired(&self) -> Result<usize, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                UPDATE session SET is_active = false
                WHERE is_active = true AND expires_at <= time::now()
                "#,
            )
            .await
            .map_err(AuthError::database)?;

        let swept: Vec<SessionRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(swept.len())
    }
}
