//! Integration tests for the OAuth routes.
//!
//! Drives the full request/response cycle through the axum router with a
//! scripted session manager standing in for the OAuth protocol exchange.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get as get_route;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use nimbus_oauth::{
    AtprotoOAuth, CallbackRequest, CurrentSession, OAuthConfig, OAuthError, OAuthSession,
    OAuthSessions, SessionCheck, StartOptions, StoredOAuthData,
};
use nimbus_store::{MemoryStorage, OAuthStorage, SetOptions};

const CLEAR_COOKIE: &str = "sid=; Path=/; Max-Age=0; HttpOnly";

/// Session manager with fixed answers keyed on handles, cookies and tokens.
struct MockSessions;

fn cookie_session(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("sid="))
}

#[async_trait]
impl OAuthSessions for MockSessions {
    async fn start_oauth(&self, handle: &str, options: StartOptions) -> nimbus_oauth::Result<String> {
        if handle == "fail.example.com" {
            return Err(OAuthError::Authorization("handle not found".into()));
        }
        let challenge = options.code_challenge.unwrap_or_default();
        Ok(format!(
            "https://bsky.social/oauth/authorize?login_hint={handle}&mobile={}&challenge={challenge}",
            options.mobile
        ))
    }

    async fn handle_callback(&self, request: CallbackRequest) -> nimbus_oauth::Result<Response> {
        if let Some(error) = request.query.get("error") {
            return Err(OAuthError::Callback(error.clone()));
        }
        Ok(Redirect::to("/").into_response())
    }

    async fn refresh_mobile_token(&self, authorization: &str) -> nimbus_oauth::Result<Value> {
        if authorization == "Bearer good" {
            Ok(json!({"success": true, "accessToken": "fresh"}))
        } else {
            Err(OAuthError::Refresh("token revoked".into()))
        }
    }

    async fn validate_session(&self, headers: &HeaderMap) -> nimbus_oauth::Result<SessionCheck> {
        match cookie_session(headers) {
            Some("alice") => Ok(SessionCheck {
                valid: true,
                did: Some("did:plc:alice".into()),
                handle: Some("alice.test".into()),
                display_name: None,
            }),
            Some("ghost") => Ok(SessionCheck {
                valid: true,
                did: Some("did:plc:ghost".into()),
                ..SessionCheck::default()
            }),
            Some("broken") => Err(OAuthError::Session("cookie signature mismatch".into())),
            _ => Ok(SessionCheck::default()),
        }
    }

    async fn validate_mobile_session(&self, authorization: &str) -> nimbus_oauth::Result<SessionCheck> {
        if authorization == "Bearer good" {
            Ok(SessionCheck {
                valid: true,
                did: Some("did:plc:alice".into()),
                ..SessionCheck::default()
            })
        } else {
            Ok(SessionCheck::default())
        }
    }

    async fn get_stored_oauth_data(&self, did: &str) -> nimbus_oauth::Result<Option<StoredOAuthData>> {
        if did != "did:plc:alice" {
            return Ok(None);
        }
        Ok(Some(StoredOAuthData {
            handle: Some("alice.bsky.social".into()),
            display_name: Some("Alice".into()),
            avatar: None,
            access_token: Some("access-1".into()),
            refresh_token: Some("refresh-1".into()),
            expires_at: Some(1_700_000_000_000),
        }))
    }

    async fn logout(&self, headers: &HeaderMap) -> nimbus_oauth::Result<()> {
        match cookie_session(headers) {
            Some("broken") => Err(OAuthError::Session("store unavailable".into())),
            _ => Ok(()),
        }
    }

    async fn get_oauth_session(&self, did: &str) -> nimbus_oauth::Result<Option<OAuthSession>> {
        if did != "did:plc:alice" {
            return Ok(None);
        }
        Ok(Some(OAuthSession {
            did: did.to_string(),
            handle: Some("alice.bsky.social".into()),
            pds_url: "https://pds.example.com".into(),
            access_token: "access-1".into(),
        }))
    }

    fn clear_cookie_header(&self) -> String {
        CLEAR_COOKIE.to_string()
    }
}

fn test_oauth() -> AtprotoOAuth {
    let config = OAuthConfig::builder("https://myapp.val.town/", "Test App")
        .cookie_secret("integration-test-secret")
        .build()
        .unwrap();
    AtprotoOAuth::new(config, Arc::new(MemoryStorage::new()), |_| {
        Arc::new(MockSessions)
    })
}

/// Sends a request and returns status, headers and the raw body.
async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

/// Helper to send a GET request with extra headers.
async fn get(uri: &str, headers: &[(&str, &str)]) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    for (key, value) in headers {
        builder = builder.header(*key, *value);
    }
    send(test_oauth().routes(), builder.body(Body::empty()).unwrap()).await
}

/// Helper to send a GET request and parse a JSON body.
async fn get_json(uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let (status, _, body) = get(uri, headers).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

/// Helper to POST a raw body.
async fn post(uri: &str, body: &str, headers: &[(&str, &str)]) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    for (key, value) in headers {
        builder = builder.header(*key, *value);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    let (status, headers, body) = send(test_oauth().routes(), req).await;
    (status, headers, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

// Client metadata

#[tokio::test]
async fn test_client_metadata_served_at_both_paths() {
    for path in ["/client-metadata.json", "/oauth-client-metadata.json"] {
        let (status, json) = get_json(path, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["client_name"], "Test App");
        assert_eq!(json["client_uri"], "https://myapp.val.town");
        assert_eq!(
            json["client_id"],
            "https://myapp.val.town/oauth-client-metadata.json"
        );
        assert_eq!(
            json["redirect_uris"],
            json!(["https://myapp.val.town/oauth/callback"])
        );
        assert_eq!(json["dpop_bound_access_tokens"], true);
        assert!(json.get("logo_uri").is_none());
    }
}

// Web login

#[tokio::test]
async fn test_login_redirects_to_authorization_server() {
    let (status, headers, _) = get("/login?handle=alice.bsky.social", &[]).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = headers.get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("https://bsky.social/oauth/authorize?login_hint=alice.bsky.social"));
    assert!(location.contains("mobile=false"));
}

#[tokio::test]
async fn test_login_strips_at_prefix() {
    let (status, headers, _) = get("/login?handle=%40alice.bsky.social", &[]).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = headers.get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.contains("login_hint=alice.bsky.social&"));
}

#[tokio::test]
async fn test_login_accepts_did_web() {
    let (status, headers, _) = get("/login?handle=did:web:example.com:user:alice", &[]).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = headers.get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.contains("login_hint=did:web:example.com:user:alice&"));
}

#[tokio::test]
async fn test_login_missing_handle() {
    let (status, _, body) = get("/login", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Invalid handle");
}

#[tokio::test]
async fn test_login_malformed_handle() {
    let (status, _, body) = get("/login?handle=not%20a%20handle", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Invalid handle");
}

#[tokio::test]
async fn test_login_start_failure() {
    let (status, _, body) = get("/login?handle=fail.example.com", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "authorization failed: handle not found"
    );
}

// Callback

#[tokio::test]
async fn test_callback_returns_session_manager_response() {
    let (status, headers, _) = get("/oauth/callback?code=abc&state=xyz", &[]).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_callback_failure() {
    let (status, _, body) = get("/oauth/callback?error=access_denied", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "Login failed: callback failed: access_denied"
    );
}

// Mobile start

#[tokio::test]
async fn test_mobile_start_success() {
    let (status, _, json) = post(
        "/api/auth/mobile-start",
        r#"{"handle": "alice.bsky.social", "code_challenge": "abc123"}"#,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let auth_url = json["authUrl"].as_str().unwrap();
    assert!(auth_url.contains("mobile=true"));
    assert!(auth_url.contains("challenge=abc123"));
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_mobile_start_accepts_did_web_with_port() {
    let (status, _, json) = post(
        "/api/auth/mobile-start",
        r#"{"handle": "did:web:localhost%3A2583", "code_challenge": "abc123"}"#,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["authUrl"]
        .as_str()
        .unwrap()
        .contains("login_hint=did:web:localhost%3A2583&"));
}

#[tokio::test]
async fn test_mobile_start_invalid_handle() {
    let (status, _, json) = post(
        "/api/auth/mobile-start",
        r#"{"handle": 42, "code_challenge": "abc123"}"#,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"error": "Invalid handle"}));
}

#[tokio::test]
async fn test_mobile_start_missing_code_challenge() {
    let (status, _, json) =
        post("/api/auth/mobile-start", r#"{"handle": "alice.bsky.social"}"#, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"error": "Missing code_challenge"}));
}

#[tokio::test]
async fn test_mobile_start_malformed_body() {
    let (status, _, json) = post("/api/auth/mobile-start", "{not json", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_mobile_start_failure() {
    let (status, _, json) = post(
        "/api/auth/mobile-start",
        r#"{"handle": "fail.example.com", "code_challenge": "abc123"}"#,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json,
        json!({"success": false, "error": "authorization failed: handle not found"})
    );
}

// Mobile refresh

#[tokio::test]
async fn test_refresh_requires_authorization() {
    let (status, json) = get_json("/mobile/refresh-token", &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json,
        json!({"success": false, "error": "Missing Authorization header"})
    );
}

#[tokio::test]
async fn test_refresh_success() {
    let (status, json) = get_json("/mobile/refresh-token", &[("authorization", "Bearer good")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true, "accessToken": "fresh"}));
}

#[tokio::test]
async fn test_refresh_failure() {
    let (status, json) = get_json("/mobile/refresh-token", &[("authorization", "Bearer stale")]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({"success": false, "error": "Token refresh failed"}));
}

// Session validation

#[tokio::test]
async fn test_validate_session_valid() {
    let (status, json) = get_json("/validate-session", &[("cookie", "sid=alice")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({"valid": true, "did": "did:plc:alice", "handle": "alice.test"})
    );
}

#[tokio::test]
async fn test_validate_session_invalid() {
    let (status, json) = get_json("/validate-session", &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, json!({"valid": false}));

    let (status, json) = get_json("/validate-session", &[("cookie", "sid=broken")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, json!({"valid": false}));
}

#[tokio::test]
async fn test_api_session_with_cookie() {
    let (status, json) = get_json("/api/auth/session", &[("cookie", "sid=alice")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "valid": true,
            "did": "did:plc:alice",
            "handle": "alice.test",
            "userHandle": "alice.test",
            "displayName": "Alice",
            "accessToken": "access-1",
            "refreshToken": "refresh-1",
            "expiresAt": 1_700_000_000_000_i64
        })
    );
}

#[tokio::test]
async fn test_api_session_with_bearer() {
    let (status, json) = get_json("/api/auth/session", &[("authorization", "Bearer good")]).await;
    assert_eq!(status, StatusCode::OK);
    // Handle falls back to the stored data when validation has none.
    assert_eq!(json["handle"], "alice.bsky.social");
    assert_eq!(json["userHandle"], "alice.bsky.social");
}

#[tokio::test]
async fn test_api_session_rejections() {
    // No stored OAuth data for the account.
    let (status, json) = get_json("/api/auth/session", &[("cookie", "sid=ghost")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, json!({"valid": false}));

    let (status, _) = get_json("/api/auth/session", &[("authorization", "Bearer nope")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_json("/api/auth/session", &[("cookie", "sid=broken")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// Logout

#[tokio::test]
async fn test_logout_clears_cookie() {
    let (status, headers, json) = post("/api/auth/logout", "", &[("cookie", "sid=alice")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true}));
    assert_eq!(headers.get(header::SET_COOKIE).unwrap(), CLEAR_COOKIE);
}

#[tokio::test]
async fn test_logout_failure() {
    let (status, _, json) = post("/api/auth/logout", "", &[("cookie", "sid=broken")]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({"success": false, "error": "Logout failed"}));
}

// Middleware

async fn whoami(CurrentSession(session): CurrentSession) -> String {
    session.did
}

fn protected_app() -> Router {
    let oauth = test_oauth();
    oauth.protect(Router::new().route("/api/me", get_route(whoami)))
}

#[tokio::test]
async fn test_protected_route_without_session() {
    let req = Request::builder().uri("/api/me").body(Body::empty()).unwrap();
    let (status, headers, body) = send(protected_app(), req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get(header::SET_COOKIE).unwrap(), CLEAR_COOKIE);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        json!({
            "error": "Authentication required",
            "message": "Please log in again",
            "code": "SESSION_EXPIRED"
        })
    );
}

#[tokio::test]
async fn test_protected_route_with_cookie_session() {
    let req = Request::builder()
        .uri("/api/me")
        .header("cookie", "sid=alice")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(protected_app(), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"did:plc:alice");
}

#[tokio::test]
async fn test_protected_route_with_bearer_session() {
    let req = Request::builder()
        .uri("/api/me")
        .header("authorization", "Bearer good")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(protected_app(), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"did:plc:alice");
}

#[tokio::test]
async fn test_protected_route_unknown_account() {
    // Valid cookie, but the session manager has no OAuth session for it.
    let req = Request::builder()
        .uri("/api/me")
        .header("cookie", "sid=ghost")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(protected_app(), req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// Factory

#[tokio::test]
async fn test_factory_validate_session() {
    let oauth = test_oauth();

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, "Bearer good".parse().unwrap());
    let validation = oauth.validate_session(&headers).await;
    assert!(validation.valid);
    assert_eq!(validation.did.as_deref(), Some("did:plc:alice"));
    assert_eq!(validation.access_token.as_deref(), Some("access-1"));

    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, "sid=broken".parse().unwrap());
    assert!(!oauth.validate_session(&headers).await.valid);
}

#[tokio::test]
async fn test_factory_passes_settings_and_shared_storage() {
    let config = OAuthConfig::builder("https://myapp.val.town", "Test App")
        .cookie_secret("integration-test-secret")
        .mobile_scheme("myapp://auth-callback")
        .build()
        .unwrap();
    let storage: Arc<dyn OAuthStorage> = Arc::new(MemoryStorage::new());

    let oauth = AtprotoOAuth::new(config, Arc::clone(&storage), |settings| {
        assert_eq!(
            settings.client_id,
            "https://myapp.val.town/oauth-client-metadata.json"
        );
        assert_eq!(settings.redirect_uri, "https://myapp.val.town/oauth/callback");
        assert_eq!(settings.base_url, "https://myapp.val.town");
        assert_eq!(settings.cookie_secret, "integration-test-secret");
        assert_eq!(settings.mobile_scheme, "myapp://auth-callback");
        assert_eq!(settings.scope, "atproto transition:generic");
        Arc::new(MockSessions)
    });

    storage
        .set("session:abc", json!({"did": "did:plc:abc"}), SetOptions::default())
        .await
        .unwrap();
    assert!(oauth.storage().has_item("session:abc").await.unwrap());
    assert_eq!(oauth.client_metadata().client_name, "Test App");
    assert_eq!(oauth.config().app_name(), "Test App");
}
