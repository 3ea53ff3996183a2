//! AT Protocol OAuth for axum applications.
//!
//! This crate wires an AT Protocol OAuth session manager into an axum
//! [`Router`](axum::Router):
//! - [`config`] - validated configuration with defaults
//! - [`metadata`] - the OAuth client metadata document
//! - [`routes`] - login, callback, mobile, session and logout endpoints
//! - [`middleware`] - session-required middleware and extractor
//! - [`factory`] - [`AtprotoOAuth`], tying it all together
//!
//! The OAuth protocol exchange itself is delegated to an implementation of
//! [`OAuthSessions`], which persists its state in any
//! [`nimbus_store::OAuthStorage`] backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod factory;
pub mod identity;
pub mod metadata;
pub mod middleware;
pub mod routes;
pub mod sessions;

pub use config::{OAuthConfig, OAuthConfigBuilder};
pub use error::{OAuthError, Result};
pub use factory::AtprotoOAuth;
pub use metadata::{generate_client_metadata, ClientMetadata};
pub use middleware::{require_session, CurrentSession};
pub use sessions::{
    CallbackRequest, OAuthSession, OAuthSessions, SessionCheck, SessionSettings,
    SessionValidation, StartOptions, StoredOAuthData,
};
