//! HTTP routes for the OAuth flow.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{
        header::{AUTHORIZATION, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::identity::validate_identifier;
use crate::metadata::ClientMetadata;
use crate::sessions::{
    validate_request, CallbackRequest, OAuthSessions, SessionValidation, StartOptions,
};

/// Shared state for the OAuth routes.
pub struct RouteState {
    /// Session manager handling the protocol.
    pub sessions: Arc<dyn OAuthSessions>,
    /// Metadata document served to authorization servers.
    pub metadata: ClientMetadata,
}

/// Builds the OAuth router.
pub fn create_router(state: Arc<RouteState>) -> Router {
    Router::new()
        // The metadata document is reachable at the advertised client_id
        // and at the shorter legacy path.
        .route("/client-metadata.json", get(client_metadata))
        .route("/oauth-client-metadata.json", get(client_metadata))
        // Web flow
        .route("/login", get(login))
        .route("/oauth/callback", get(callback))
        // Mobile flow
        .route("/api/auth/mobile-start", post(mobile_start))
        .route("/mobile/refresh-token", get(refresh_token))
        // Session inspection
        .route("/validate-session", get(validate_session))
        .route("/api/auth/session", get(session))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MobileStartResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn client_metadata(State(state): State<Arc<RouteState>>) -> Json<ClientMetadata> {
    Json(state.metadata.clone())
}

async fn login(
    State(state): State<Arc<RouteState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(handle) = params.get("handle").and_then(|h| validate_identifier(h).ok()) else {
        return (StatusCode::BAD_REQUEST, "Invalid handle").into_response();
    };

    match state.sessions.start_oauth(&handle, StartOptions::default()).await {
        Ok(auth_url) => redirect(&auth_url),
        Err(e) => {
            error!(handle = %handle, error = %e, "OAuth authorize failed");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn callback(
    State(state): State<Arc<RouteState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    match state
        .sessions
        .handle_callback(CallbackRequest { query, headers })
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "OAuth callback failed");
            (StatusCode::BAD_REQUEST, format!("Login failed: {e}")).into_response()
        }
    }
}

async fn mobile_start(State(state): State<Arc<RouteState>>, body: Bytes) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => return mobile_start_failed(e.to_string()),
    };

    let Some(handle) = body
        .get("handle")
        .and_then(Value::as_str)
        .and_then(|h| validate_identifier(h).ok())
    else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid handle"}))).into_response();
    };

    let Some(code_challenge) = body.get("code_challenge").and_then(Value::as_str) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing code_challenge"})),
        )
            .into_response();
    };

    info!(handle = %handle, "starting mobile OAuth authorize");

    let options = StartOptions {
        mobile: true,
        code_challenge: Some(code_challenge.to_string()),
    };
    match state.sessions.start_oauth(&handle, options).await {
        Ok(auth_url) => {
            info!(handle = %handle, "generated mobile authorization URL");
            Json(MobileStartResponse {
                success: true,
                auth_url: Some(auth_url),
                error: None,
            })
            .into_response()
        }
        Err(e) => {
            error!(handle = %handle, error = %e, "mobile OAuth start failed");
            mobile_start_failed(e.to_string())
        }
    }
}

fn mobile_start_failed(message: String) -> Response {
    let body = MobileStartResponse {
        success: false,
        auth_url: None,
        error: Some(message),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

async fn refresh_token(State(state): State<Arc<RouteState>>, headers: HeaderMap) -> Response {
    let Some(authorization) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Missing Authorization header"})),
        )
            .into_response();
    };

    match state.sessions.refresh_mobile_token(authorization).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            error!(error = %e, "token refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Token refresh failed"})),
            )
                .into_response()
        }
    }
}

async fn validate_session(State(state): State<Arc<RouteState>>, headers: HeaderMap) -> Response {
    match state.sessions.validate_session(&headers).await {
        Ok(check) if check.valid => Json(SessionValidation {
            valid: true,
            did: check.did,
            handle: check.handle,
            ..SessionValidation::default()
        })
        .into_response(),
        Ok(_) => unauthorized(),
        Err(e) => {
            error!(error = %e, "session validation failed");
            unauthorized()
        }
    }
}

async fn session(State(state): State<Arc<RouteState>>, headers: HeaderMap) -> Response {
    match validate_request(state.sessions.as_ref(), &headers).await {
        Ok(validation) if validation.valid => Json(validation).into_response(),
        Ok(_) => unauthorized(),
        Err(e) => {
            error!(error = %e, "session validation failed");
            unauthorized()
        }
    }
}

async fn logout(State(state): State<Arc<RouteState>>, headers: HeaderMap) -> Response {
    match state.sessions.logout(&headers).await {
        Ok(()) => {
            let response = Json(json!({"success": true})).into_response();
            with_clear_cookie(response, &state.sessions.clear_cookie_header())
        }
        Err(e) => {
            error!(error = %e, "logout failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Logout failed"})),
            )
                .into_response()
        }
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(SessionValidation::invalid())).into_response()
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
        Err(e) => {
            error!(error = %e, "authorization URL is not a valid header value");
            (StatusCode::BAD_REQUEST, "Couldn't initiate login").into_response()
        }
    }
}

/// Appends a `Set-Cookie` header; values that are not valid header text are dropped.
pub(crate) fn with_clear_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, "clear-cookie header is not valid header text"),
    }
    response
}
