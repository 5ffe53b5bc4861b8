use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "homehub".to_string()),
            database: env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "auth".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // User accounts. The unique index backstops the duplicate check in
        // the credential store against concurrent creates.
        "DEFINE TABLE user SCHEMAFULL;
         DEFINE FIELD username ON TABLE user TYPE string;
         DEFINE FIELD password_hash ON TABLE user TYPE string;
         DEFINE FIELD email ON TABLE user TYPE option<string>;
         DEFINE FIELD display_name ON TABLE user TYPE option<string>;
         DEFINE FIELD role ON TABLE user TYPE string;
         DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
         DEFINE FIELD failed_attempts ON TABLE user TYPE number DEFAULT 0;
         DEFINE FIELD last_failed_at ON TABLE user TYPE option<datetime>;
         DEFINE FIELD locked_until ON TABLE user TYPE option<datetime>;
         DEFINE FIELD last_login_at ON TABLE user TYPE option<datetime>;
         DEFINE FIELD created_at ON TABLE user TYPE datetime DEFAULT time::now();
         DEFINE FIELD updated_at ON TABLE user TYPE datetime DEFAULT time::now();",
        "DEFINE INDEX user_username ON TABLE user COLUMNS username UNIQUE;",
        // Sessions. A user owns zero or more; rows are retired by flipping
        // is_active, never deleted.
        "DEFINE TABLE session SCHEMAFULL;
         DEFINE FIELD user_id ON TABLE session TYPE record<user>;
         DEFINE FIELD access_token ON TABLE session TYPE string;
         DEFINE FIELD refresh_token ON TABLE session TYPE string;
         DEFINE FIELD ip_address ON TABLE session TYPE option<string>;
         DEFINE FIELD user_agent ON TABLE session TYPE option<string>;
         DEFINE FIELD is_active ON TABLE session TYPE bool DEFAULT true;
         DEFINE FIELD expires_at ON TABLE session TYPE datetime;
         DEFINE FIELD last_activity_at ON TABLE session TYPE datetime DEFAULT time::now();
         DEFINE FIELD created_at ON TABLE session TYPE datetime DEFAULT time::now();",
        "DEFINE INDEX session_access_token ON TABLE session COLUMNS access_token;
         DEFINE INDEX session_refresh_token ON TABLE session COLUMNS refresh_token;
         DEFINE INDEX session_user_id ON TABLE session COLUMNS user_id;",
        // Audit trail. Append-only; nothing in the auth core updates or
        // deletes rows except the retention pruner.
        "DEFINE TABLE audit_log SCHEMALESS;
         DEFINE FIELD user_id ON TABLE audit_log TYPE option<string>;
         DEFINE FIELD action ON TABLE audit_log TYPE string;
         DEFINE FIELD detail ON TABLE audit_log TYPE option<object>;
         DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
         DEFINE FIELD user_agent ON TABLE audit_log TYPE option<string>;
         DEFINE FIELD success ON TABLE audit_log TYPE bool;
         DEFINE FIELD created_at ON TABLE audit_log TYPE datetime DEFAULT time::now();",
        "DEFINE INDEX audit_user_id ON TABLE audit_log COLUMNS user_id;
         DEFINE INDEX audit_action ON TABLE audit_log COLUMNS action;",
    ];

    for query in schema_queries {
        db.query(query).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_connection_and_schema() {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();

        // Schema definition is idempotent.
        ensure_schema(&db).await.unwrap();
    }
}
