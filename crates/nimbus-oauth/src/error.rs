//! OAuth integration error types.

use nimbus_store::StoreError;
use thiserror::Error;

/// Result type alias for OAuth integration operations.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors raised while configuring or serving the OAuth integration.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// No base URL was configured.
    #[error("baseUrl is required")]
    MissingBaseUrl,

    /// No application name was configured.
    #[error("appName is required")]
    MissingAppName,

    /// The base URL does not parse.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The login identifier is neither a handle nor a DID.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Starting the authorization flow failed.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The authorization server callback could not be completed.
    #[error("callback failed: {0}")]
    Callback(String),

    /// A mobile token refresh failed.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    /// Session lookup or teardown failed.
    #[error("session error: {0}")]
    Session(String),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
