//! OAuth client metadata document.
//!
//! AT Protocol authorization servers fetch this document from the
//! `client_id` URL to learn about the client before showing a consent screen.

use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;

/// Client metadata for a public, DPoP-bound web client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Display name.
    pub client_name: String,
    /// URL this document is served from.
    pub client_id: String,
    /// Application home page.
    pub client_uri: String,
    /// Allowed redirect URIs.
    pub redirect_uris: Vec<String>,
    /// Requested scope.
    pub scope: String,
    /// Grant types the client uses.
    pub grant_types: Vec<String>,
    /// Response types the client uses.
    pub response_types: Vec<String>,
    /// Always `web`.
    pub application_type: String,
    /// Always `none`; the client holds no secret.
    pub token_endpoint_auth_method: String,
    /// Tokens are bound to a DPoP key.
    pub dpop_bound_access_tokens: bool,
    /// Logo URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Privacy policy URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,
}

/// Builds the metadata document for `config`.
#[must_use]
pub fn generate_client_metadata(config: &OAuthConfig) -> ClientMetadata {
    ClientMetadata {
        client_name: config.app_name().to_string(),
        client_id: config.client_id(),
        client_uri: config.base_url().to_string(),
        redirect_uris: vec![config.redirect_uri()],
        scope: config.scope().to_string(),
        grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
        response_types: vec!["code".to_string()],
        application_type: "web".to_string(),
        token_endpoint_auth_method: "none".to_string(),
        dpop_bound_access_tokens: true,
        logo_uri: config.logo_uri().map(str::to_string),
        policy_uri: config.policy_uri().map(str::to_string),
    }
}
