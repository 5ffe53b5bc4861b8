// Core modules
mod config;
pub mod db;
mod types;

// Auth core and its HTTP shell
pub mod api;
pub mod auth;

// Re-export key types and functions
pub use api::{ApiState, create_router};
pub use auth::{
    AuthError, AuthService, CredentialStore, Identity, LoginResponse, SessionStore, TokenCodec,
    UserProfile, authenticate, authorize,
};
pub use config::{AuthConfig, DEV_JWT_SECRET};
pub use db::{DatabaseConfig, UserRole, create_connection, ensure_schema};
pub use types::{AccessToken, RefreshToken};

use anyhow::Result;
use std::sync::Arc;

/// Convenience function to create a fully wired auth service.
///
/// Connects to the database, ensures the schema, and builds the service
/// with the given policy configuration.
pub async fn create_auth(
    db_config: DatabaseConfig,
    auth_config: &AuthConfig,
) -> Result<Arc<AuthService>> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let service = AuthService::new(db, auth_config)?;

    Ok(Arc::new(service))
}
