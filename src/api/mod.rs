// REST API endpoints for the auth subsystem

use axum::extract::{Query, State};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use http::{HeaderMap, header};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{ACCESS_COOKIE, REFRESH_COOKIE, cookie_value};
use crate::auth::{
    AuthError, AuthService, Identity, UserProfile, authenticate, authorize, validate_username,
};
use crate::config::AuthConfig;
use crate::db::UserRole;
use crate::types::RefreshToken;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthService>,
    pub config: AuthConfig,
}

pub fn create_router(state: ApiState) -> Router {
    let admin_routes = Router::new()
        .route("/audit", get(list_audit))
        .route_layer(middleware::from_fn(authorize(&[UserRole::Admin])));

    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route("/auth/me", get(me))
        .route("/auth/sessions", get(list_sessions))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            authenticate,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    // Shape checks happen before the service is consulted; a malformed
    // request is a 400, not a credential failure.
    validate_username(&body.username)?;
    if body.password.is_empty() {
        return Err(AuthError::Validation("password is required".to_string()));
    }

    let (ip_address, user_agent) = client_info(&headers);
    let login = state
        .auth
        .login(&body.username, &body.password, ip_address, user_agent)
        .await?;

    let cookies = AppendHeaders([
        (
            header::SET_COOKIE,
            auth_cookie(
                ACCESS_COOKIE,
                login.access_token.as_str(),
                state.config.access_ttl_secs,
                state.config.secure_cookies,
            ),
        ),
        (
            header::SET_COOKIE,
            auth_cookie(
                REFRESH_COOKIE,
                login.refresh_token.as_str(),
                state.config.refresh_ttl_secs,
                state.config.secure_cookies,
            ),
        ),
    ]);

    // Tokens are echoed in the body as well for non-browser callers.
    let body = Json(serde_json::json!({
        "success": true,
        "user": login.user,
        "token": login.access_token,
        "refresh_token": login.refresh_token,
    }));

    Ok((cookies, body).into_response())
}

async fn logout(
    State(state): State<ApiState>,
    identity: Identity,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let (ip_address, _) = client_info(&headers);

    state
        .auth
        .logout(&identity.access_token, &identity.user_id.to_string(), ip_address)
        .await?;

    let cookies = AppendHeaders([
        (header::SET_COOKIE, clear_cookie(ACCESS_COOKIE)),
        (header::SET_COOKIE, clear_cookie(REFRESH_COOKIE)),
    ]);

    Ok((cookies, Json(serde_json::json!({"success": true}))).into_response())
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: Option<String>,
}

async fn refresh(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<Response, AuthError> {
    // Cookie first, body fallback for non-browser callers.
    let token = cookie_value(&headers, REFRESH_COOKIE)
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .ok_or_else(AuthError::session)?;

    let login = state.auth.refresh(&RefreshToken::new(token)).await?;

    let cookies = AppendHeaders([
        (
            header::SET_COOKIE,
            auth_cookie(
                ACCESS_COOKIE,
                login.access_token.as_str(),
                state.config.access_ttl_secs,
                state.config.secure_cookies,
            ),
        ),
        (
            header::SET_COOKIE,
            auth_cookie(
                REFRESH_COOKIE,
                login.refresh_token.as_str(),
                state.config.refresh_ttl_secs,
                state.config.secure_cookies,
            ),
        ),
    ]);

    let body = Json(serde_json::json!({
        "success": true,
        "user": login.user,
        "token": login.access_token,
        "refresh_token": login.refresh_token,
    }));

    Ok((cookies, body).into_response())
}

#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<ApiState>,
    identity: Identity,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Response, AuthError> {
    let (ip_address, _) = client_info(&headers);

    state
        .auth
        .change_password(
            &identity.user_id,
            &body.old_password,
            &body.new_password,
            ip_address,
        )
        .await?;

    // Every session just died, including this one; clear the cookies so the
    // browser re-logins cleanly.
    let cookies = AppendHeaders([
        (header::SET_COOKIE, clear_cookie(ACCESS_COOKIE)),
        (header::SET_COOKIE, clear_cookie(REFRESH_COOKIE)),
    ]);

    Ok((cookies, Json(serde_json::json!({"success": true}))).into_response())
}

async fn me(
    State(state): State<ApiState>,
    identity: Identity,
) -> Result<Json<Value>, AuthError> {
    let user = state
        .auth
        .credentials()
        .find_by_id(&identity.user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "user": UserProfile::from(user),
    })))
}

async fn list_sessions(
    State(state): State<ApiState>,
    identity: Identity,
) -> Result<Json<Value>, AuthError> {
    let sessions = state.auth.sessions().active_for_user(&identity.user_id).await?;

    // Token values never leave the server; callers see metadata only.
    let sessions: Vec<Value> = sessions
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id.to_string(),
                "ip_address": s.ip_address,
                "user_agent": s.user_agent,
                "created_at": s.created_at,
                "last_activity_at": s.last_activity_at,
                "expires_at": s.expires_at,
                "current": s.id == identity.session_id,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({"success": true, "sessions": sessions})))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    limit: Option<u32>,
    failures_only: Option<bool>,
}

async fn list_audit(
    State(state): State<ApiState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, AuthError> {
    let limit = query.limit.unwrap_or(50).min(500);

    let entries = if query.failures_only.unwrap_or(false) {
        state.auth.audit().recent_failures(limit).await?
    } else {
        state.auth.audit().recent(limit).await?
    };

    let entries: Vec<Value> = entries
        .into_iter()
        .map(|e| {
            serde_json::json!({
                "id": e.id.to_string(),
                "user_id": e.user_id,
                "action": e.action,
                "detail": e.detail,
                "ip_address": e.ip_address,
                "user_agent": e.user_agent,
                "success": e.success,
                "created_at": e.created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({"success": true, "entries": entries})))
}

/// Best-effort client metadata for the audit trail. The transport layer (or
/// a reverse proxy) is responsible for the forwarding headers.
fn client_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        });

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    (ip_address, user_agent)
}

fn auth_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn setup_api() -> (Router, ApiState) {
        let db_config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(db_config).await.unwrap();
        ensure_schema(&db).await.unwrap();

        let config = AuthConfig::for_tests();
        let auth = Arc::new(AuthService::new(db, &config).unwrap());
        auth.credentials()
            .create("admin", "Secret1", None, None, UserRole::Admin)
            .await
            .unwrap();
        auth.credentials()
            .create("viewer", "Secret1", None, None, UserRole::User)
            .await
            .unwrap();

        let state = ApiState { auth, config };
        (create_router(state.clone()), state)
    }

    fn post_json(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_bearer(path: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login_token(app: &Router, username: &str, password: &str) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": username, "password": password}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_sets_cookies_and_returns_tokens() {
        let (app, _state) = setup_api().await;

        let response = app
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": "admin", "password": "Secret1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
        assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["username"], "admin");
        assert!(body["user"].get("password_hash").is_none());
        assert!(body["token"].is_string());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable_over_http() {
        let (app, _state) = setup_api().await;

        let unknown = app
            .clone()
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": "ghost", "password": "whatever"}),
            ))
            .await
            .unwrap();
        let wrong = app
            .clone()
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": "admin", "password": "wrong"}),
            ))
            .await
            .unwrap();

        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(unknown).await, body_json(wrong).await);
    }

    #[tokio::test]
    async fn test_login_validates_request_shape() {
        let (app, _state) = setup_api().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": "no spaces allowed", "password": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": "admin", "password": ""}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_locked_account_is_423() {
        let (app, _state) = setup_api().await;

        for _ in 0..5 {
            app.clone()
                .oneshot(post_json(
                    "/auth/login",
                    serde_json::json!({"username": "admin", "password": "wrong"}),
                ))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": "admin", "password": "Secret1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::LOCKED);
        assert_eq!(body_json(response).await["code"], "TOO_MANY_ATTEMPTS");
    }

    #[tokio::test]
    async fn test_me_and_sessions_require_auth() {
        let (app, _state) = setup_api().await;

        for path in ["/auth/me", "/auth/sessions"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let token = login_token(&app, "admin", "Secret1").await;

        let response = app
            .clone()
            .oneshot(get_with_bearer("/auth/me", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["user"]["username"], "admin");

        let response = app
            .oneshot(get_with_bearer("/auth/sessions", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        // Token values never appear in the listing.
        assert!(sessions[0].get("access_token").is_none());
        assert_eq!(sessions[0]["current"], true);
    }

    #[tokio::test]
    async fn test_refresh_via_body_rotates() {
        let (app, _state) = setup_api().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({"username": "admin", "password": "Secret1"}),
            ))
            .await
            .unwrap();
        let login_body = body_json(response).await;
        let refresh_token = login_body["refresh_token"].as_str().unwrap().to_string();
        let old_access = login_body["token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/refresh",
                serde_json::json!({"refresh_token": refresh_token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_ne!(body["token"].as_str().unwrap(), old_access);

        // The rotated-out access token is dead.
        let response = app
            .clone()
            .oneshot(get_with_bearer("/auth/me", &old_access))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // The refresh token was single-use.
        let response = app
            .oneshot(post_json(
                "/auth/refresh",
                serde_json::json!({"refresh_token": login_body["refresh_token"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_change_password_kills_session() {
        let (app, _state) = setup_api().await;

        let token = login_token(&app, "admin", "Secret1").await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/change-password")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "old_password": "Secret1",
                            "new_password": "Fresher2",
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The session that made the change is gone with the rest.
        let response = app
            .oneshot(get_with_bearer("/auth/me", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_clears_cookies_and_is_idempotent() {
        let (app, _state) = setup_api().await;

        let token = login_token(&app, "admin", "Secret1").await;

        let logout_request = |token: &str| {
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(logout_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

        // The token no longer authenticates, so the second logout is a 401
        // at the gate, not a server error.
        let response = app.oneshot(logout_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_audit_route_is_admin_only() {
        let (app, _state) = setup_api().await;

        let admin_token = login_token(&app, "admin", "Secret1").await;
        let viewer_token = login_token(&app, "viewer", "Secret1").await;

        let response = app
            .clone()
            .oneshot(get_with_bearer("/audit", &viewer_token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(get_with_bearer("/audit?limit=10", &admin_token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let entries = body["entries"].as_array().unwrap();
        // Both logins above are in the trail.
        assert!(entries.iter().any(|e| e["action"] == "login_success"));
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _state) = setup_api().await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = auth_cookie("access_token", "tok", 604800, false);
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));

        let secure = auth_cookie("access_token", "tok", 604800, true);
        assert!(secure.contains("Secure"));

        let cleared = clear_cookie("access_token");
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_client_info_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.9, 172.16.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.8".parse().unwrap());
        headers.insert(header::USER_AGENT, "console/1.0".parse().unwrap());

        let (ip, agent) = client_info(&headers);
        assert_eq!(ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(agent.as_deref(), Some("console/1.0"));

        let (ip, agent) = client_info(&HeaderMap::new());
        assert!(ip.is_none());
        assert!(agent.is_none());
    }
}
