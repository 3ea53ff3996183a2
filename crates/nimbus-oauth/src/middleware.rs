//! Axum middleware and extractors for authenticated routes.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::routes::with_clear_cookie;
use crate::sessions::{OAuthSession, OAuthSessions};

/// Middleware that requires a valid OAuth session.
///
/// Resolves the session from cookies or a bearer token and stores it in the
/// request extensions for [`CurrentSession`]. Requests without a session get
/// a 401 and the session cookie is cleared.
///
/// ```ignore
/// let protected = Router::new()
///     .route("/api/bookmarks", post(create_bookmark))
///     .route_layer(axum::middleware::from_fn_with_state(sessions, require_session));
/// ```
pub async fn require_session(
    State(sessions): State<Arc<dyn OAuthSessions>>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers().clone();
    match sessions.session_from_request(&headers).await {
        Ok(Some(session)) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Ok(None) => session_expired(sessions.as_ref()),
        Err(e) => {
            warn!(error = %e, "session lookup failed");
            session_expired(sessions.as_ref())
        }
    }
}

fn session_expired(sessions: &dyn OAuthSessions) -> Response {
    with_clear_cookie(
        SessionRejection.into_response(),
        &sessions.clear_cookie_header(),
    )
}

/// Extractor for the session resolved by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentSession(pub OAuthSession);

/// Rejection used when no session is available.
#[derive(Debug, Clone, Copy)]
pub struct SessionRejection;

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Authentication required",
                "message": "Please log in again",
                "code": "SESSION_EXPIRED"
            })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OAuthSession>()
            .cloned()
            .map(Self)
            .ok_or(SessionRejection)
    }
}
