//! Session manager seam.
//!
//! The OAuth protocol itself (PAR, PKCE, DPoP, token exchange, signed
//! cookies) is performed by an [`OAuthSessions`] implementation supplied by
//! the embedding application. This crate only routes requests to it and
//! shapes its answers into HTTP responses.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::response::Response;
use nimbus_store::OAuthStorage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Everything a session manager needs to be constructed.
#[derive(Clone)]
pub struct SessionSettings {
    /// Client identifier advertised to authorization servers.
    pub client_id: String,
    /// Authorization callback URL.
    pub redirect_uri: String,
    /// Public base URL of the application.
    pub base_url: String,
    /// Secret for signing session cookies.
    pub cookie_secret: String,
    /// URL scheme mobile clients are redirected to.
    pub mobile_scheme: String,
    /// Requested OAuth scope.
    pub scope: String,
    /// Shared storage for OAuth state and sessions.
    pub storage: Arc<dyn OAuthStorage>,
}

/// Options for starting an authorization flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// The flow was started by a mobile client.
    pub mobile: bool,
    /// PKCE challenge provided by the mobile client.
    pub code_challenge: Option<String>,
}

/// The parts of the callback request a session manager reads.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    /// Decoded query parameters (`code`, `state`, `iss`, ...).
    pub query: HashMap<String, String>,
    /// Request headers, including cookies.
    pub headers: HeaderMap,
}

/// Outcome of validating a cookie or bearer session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCheck {
    /// The session is valid.
    pub valid: bool,
    /// Account DID.
    pub did: Option<String>,
    /// Account handle.
    pub handle: Option<String>,
    /// Profile display name.
    pub display_name: Option<String>,
}

/// OAuth data persisted for an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOAuthData {
    /// Account handle.
    pub handle: Option<String>,
    /// Profile display name.
    pub display_name: Option<String>,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// Current access token.
    pub access_token: Option<String>,
    /// Current refresh token.
    pub refresh_token: Option<String>,
    /// Access token expiry in epoch milliseconds.
    pub expires_at: Option<i64>,
}

/// An authenticated OAuth session usable for calls to the user's PDS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSession {
    /// Account DID.
    pub did: String,
    /// Account handle.
    pub handle: Option<String>,
    /// Base URL of the user's PDS.
    pub pds_url: String,
    /// Access token for PDS requests.
    pub access_token: String,
}

/// The operations this crate consumes from a session manager.
#[async_trait]
pub trait OAuthSessions: Send + Sync {
    /// Begins authorization for `handle` and returns the URL to send the user to.
    async fn start_oauth(&self, handle: &str, options: StartOptions) -> Result<String>;

    /// Completes the authorization callback and produces the final response.
    async fn handle_callback(&self, request: CallbackRequest) -> Result<Response>;

    /// Refreshes a mobile session from its `Authorization` header value.
    async fn refresh_mobile_token(&self, authorization: &str) -> Result<Value>;

    /// Validates the cookie session carried by `headers`.
    async fn validate_session(&self, headers: &HeaderMap) -> Result<SessionCheck>;

    /// Validates a mobile session from its `Authorization` header value.
    async fn validate_mobile_session(&self, authorization: &str) -> Result<SessionCheck>;

    /// Loads the stored OAuth data for `did`.
    async fn get_stored_oauth_data(&self, did: &str) -> Result<Option<StoredOAuthData>>;

    /// Ends the session carried by `headers`.
    async fn logout(&self, headers: &HeaderMap) -> Result<()>;

    /// Loads a usable OAuth session for `did`.
    async fn get_oauth_session(&self, did: &str) -> Result<Option<OAuthSession>>;

    /// `Set-Cookie` value that clears the session cookie.
    fn clear_cookie_header(&self) -> String;

    /// Resolves the session for a request, whether web (cookie) or mobile
    /// (`Authorization: Bearer`).
    async fn session_from_request(&self, headers: &HeaderMap) -> Result<Option<OAuthSession>> {
        let check = match bearer_authorization(headers) {
            Some(authorization) => self.validate_mobile_session(authorization).await?,
            None => self.validate_session(headers).await?,
        };

        match check.did {
            Some(did) if check.valid => self.get_oauth_session(&did).await,
            _ => Ok(None),
        }
    }
}

/// Returns the `Authorization` header value when it carries a bearer token.
#[must_use]
pub fn bearer_authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("Bearer "))
}

/// Full session answer returned by `/api/auth/session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValidation {
    /// The session is valid.
    pub valid: bool,
    /// Account DID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// Account handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Same as `handle`, for mobile clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
    /// Profile display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Current access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Current refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl SessionValidation {
    /// An invalid session.
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Merges a session check with the stored data for the same account.
    ///
    /// Values from the check win over stored ones.
    #[must_use]
    pub fn from_parts(did: String, check: SessionCheck, data: StoredOAuthData) -> Self {
        let handle = check.handle.or(data.handle);
        Self {
            valid: true,
            did: Some(did),
            user_handle: handle.clone(),
            handle,
            display_name: check.display_name.or(data.display_name),
            avatar: data.avatar,
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_at: data.expires_at,
        }
    }
}

/// Validates the request's session (bearer first, then cookie) and joins it
/// with the account's stored OAuth data.
///
/// # Errors
/// Propagates session manager failures.
pub async fn validate_request(
    sessions: &dyn OAuthSessions,
    headers: &HeaderMap,
) -> Result<SessionValidation> {
    let check = match bearer_authorization(headers) {
        Some(authorization) => {
            tracing::debug!("validating mobile bearer session");
            sessions.validate_mobile_session(authorization).await?
        }
        None => {
            tracing::debug!("validating cookie session");
            sessions.validate_session(headers).await?
        }
    };

    let did = match check.did.clone() {
        Some(did) if check.valid => did,
        _ => return Ok(SessionValidation::invalid()),
    };

    match sessions.get_stored_oauth_data(&did).await? {
        Some(data) => Ok(SessionValidation::from_parts(did, check, data)),
        None => Ok(SessionValidation::invalid()),
    }
}
