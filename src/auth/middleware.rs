//! Per-request authentication gate.
//!
//! Extracts the access token (cookie first, `Authorization: Bearer` for
//! non-browser callers), verifies the signature, confirms the backing
//! session is live, stamps activity, and attaches an [`Identity`] to the
//! request. Every failure is the same generic 401; the precise cause only
//! ever reaches the server log.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::HeaderMap;
use http::request::Parts;
use surrealdb::RecordId;
use tracing::debug;

use crate::auth::error::AuthError;
use crate::auth::service::AuthService;
use crate::db::UserRole;
use crate::types::AccessToken;

/// Cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Authenticated caller identity, attached to the request extensions by
/// [`authenticate`].
#[derive(Debug, Clone)]
pub struct Identity {
    /// User record id, taken from the live session row.
    pub user_id: RecordId,
    /// Login name at token issue time.
    pub username: String,
    /// Role at token issue time.
    pub role: UserRole,
    /// The session this request is riding on.
    pub session_id: RecordId,
    /// The token the caller presented; logout needs it back.
    pub access_token: AccessToken,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(AuthError::session)
    }
}

/// Authentication middleware for `axum::middleware::from_fn_with_state`.
pub async fn authenticate(
    State(auth): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Response {
    match identify(&auth, req.headers()).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

/// Role gate for `axum::middleware::from_fn`, layered inside
/// [`authenticate`]. 403 when the attached identity's role is not in the
/// allowed set; 401 when no identity was attached at all.
pub fn authorize(
    allowed: &'static [UserRole],
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let Some(identity) = req.extensions().get::<Identity>() else {
                return AuthError::session().into_response();
            };
            if !allowed.contains(&identity.role) {
                return AuthError::Authorization.into_response();
            }
            next.run(req).await
        })
    }
}

async fn identify(auth: &AuthService, headers: &HeaderMap) -> Result<Identity, AuthError> {
    let token = token_from_headers(headers).ok_or_else(|| {
        debug!("request carried no access token");
        AuthError::session()
    })?;
    let token = AccessToken::new(token);

    let claims = auth.tokens().verify_access(&token).map_err(|e| {
        debug!("access token rejected: {e}");
        AuthError::session()
    })?;

    // Signature alone is not enough: the session must still be live, which
    // is what makes logout and password-change revocation effective.
    let session = auth
        .sessions()
        .find_by_access_token(&token)
        .await?
        .ok_or_else(|| {
            debug!("verified token has no live session");
            AuthError::session()
        })?;

    auth.sessions().touch_activity(&session.id).await?;

    Ok(Identity {
        user_id: session.user_id,
        username: claims.username,
        role: claims.role,
        session_id: session.id,
        access_token: token,
    })
}

/// Pull the access token out of the request: secure cookie first, then the
/// `Authorization: Bearer` header for non-browser callers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = cookie_value(headers, ACCESS_COOKIE) {
        return Some(token);
    }

    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Read a single cookie value out of the `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
