//! Append-only audit trail of security-relevant events.
//!
//! Entries are written synchronously with the operation that caused them,
//! before its result is returned. A failed write degrades observability,
//! never security: the failure is logged and the triggering operation
//! completes anyway.

use tracing::error;

use crate::auth::error::AuthError;
use crate::db::{AuditLogCreate, AuditLogRecord, Db};

/// Sink for audit entries.
#[derive(Clone)]
pub struct AuditLog {
    db: Db,
}

impl AuditLog {
    /// Create a new audit log over the given database handle.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Append one entry.
    ///
    /// Never returns an error to the caller: a datastore failure here must
    /// not block the security operation that produced the entry.
    pub async fn append(&self, entry: AuditLogCreate) {
        let result = self
            .db
            .query(
                r#"
                CREATE audit_log CONTENT {
                    user_id: $user_id,
                    action: $action,
                    detail: $detail,
                    ip_address: $ip_address,
                    user_agent: $user_agent,
                    success: $success
                }
                "#,
            )
            .bind(("user_id", entry.user_id.clone()))
            .bind(("action", entry.action))
            .bind(("detail", entry.detail.clone()))
            .bind(("ip_address", entry.ip_address.clone()))
            .bind(("user_agent", entry.user_agent.clone()))
            .bind(("success", entry.success))
            .await;

        if let Err(e) = result {
            error!(
                action = entry.action.as_str(),
                user_id = entry.user_id.as_deref(),
                "failed to append audit entry: {e}"
            );
        }
    }

    /// Recent entries, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AuditLogRecord>, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT * FROM audit_log
                ORDER BY created_at DESC
                LIMIT $limit
                "#,
            )
            .bind(("limit", limit as i64))
            .await
            .map_err(AuthError::database)?;

        let entries: Vec<AuditLogRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(entries)
    }

    /// Recent entries for one user, newest first.
    pub async fn recent_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditLogRecord>, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT * FROM audit_log
                WHERE user_id = $user_id
                ORDER BY created_at DESC
                LIMIT $limit
                "#,
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("limit", limit as i64))
            .await
            .map_err(AuthError::database)?;

        let entries: Vec<AuditLogRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(entries)
    }

    /// Recent failed operations, newest first.
    pub async fn recent_failures(&self, limit: u32) -> Result<Vec<AuditLogRecord>, AuthError> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT * FROM audit_log
                WHERE success = false
                ORDER BY created_at DESC
                LIMIT $limit
                "#,
            )
            .bind(("limit", limit as i64))
            .await
            .map_err(AuthError::database)?;

        let entries: Vec<AuditLogRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(entries)
    }

    /// Delete entries older than the retention window. Returns how many rows
    /// were removed. The only deletion path in the subsystem.
    pub async fn prune_older_than(&self, days: u32) -> Result<usize, AuthError> {
        let cutoff =
            surrealdb::sql::Datetime::from(chrono::Utc::now() - chrono::Duration::days(days as i64));

        let mut res = self
            .db
            .query("DELETE FROM audit_log WHERE created_at < $cutoff RETURN BEFORE")
            .bind(("cutoff", cutoff))
            .await
            .map_err(AuthError::database)?;

        let removed: Vec<AuditLogRecord> = res.take(0).map_err(AuthError::database)?;
        Ok(removed.len())
    }
}
