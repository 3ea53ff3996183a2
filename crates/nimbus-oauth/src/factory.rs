//! Assembles configuration, storage and the session manager into one handle.

use std::sync::Arc;

use axum::{http::HeaderMap, middleware::from_fn_with_state, Router};
use nimbus_store::OAuthStorage;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::OAuthConfig;
use crate::metadata::{generate_client_metadata, ClientMetadata};
use crate::middleware::require_session;
use crate::routes::{create_router, RouteState};
use crate::sessions::{validate_request, OAuthSessions, SessionSettings, SessionValidation};

/// A configured AT Protocol OAuth integration.
///
/// ```ignore
/// let config = OAuthConfig::builder("https://myapp.example.com", "My App").build()?;
/// let storage: Arc<dyn OAuthStorage> = Arc::new(SqliteStorage::open("oauth.db")?);
/// let oauth = AtprotoOAuth::new(config, storage, |settings| Arc::new(MySessions::new(settings)));
///
/// let app = Router::new()
///     .merge(oauth.protect(api_routes()))
///     .merge(oauth.routes());
/// ```
pub struct AtprotoOAuth {
    config: OAuthConfig,
    storage: Arc<dyn OAuthStorage>,
    sessions: Arc<dyn OAuthSessions>,
    metadata: ClientMetadata,
}

impl AtprotoOAuth {
    /// Creates the integration.
    ///
    /// `make_sessions` receives the settings derived from `config` together
    /// with `storage`, and returns the session manager the routes delegate to.
    pub fn new<F>(config: OAuthConfig, storage: Arc<dyn OAuthStorage>, make_sessions: F) -> Self
    where
        F: FnOnce(SessionSettings) -> Arc<dyn OAuthSessions>,
    {
        let settings = SessionSettings {
            client_id: config.client_id(),
            redirect_uri: config.redirect_uri(),
            base_url: config.base_url().to_string(),
            cookie_secret: config.cookie_secret().to_string(),
            mobile_scheme: config.mobile_scheme().to_string(),
            scope: config.scope().to_string(),
            storage: Arc::clone(&storage),
        };
        let sessions = make_sessions(settings);
        let metadata = generate_client_metadata(&config);

        info!(
            base_url = %config.base_url(),
            client_id = %metadata.client_id,
            "OAuth integration configured"
        );

        Self {
            config,
            storage,
            sessions,
            metadata,
        }
    }

    /// Router with every OAuth route mounted.
    pub fn routes(&self) -> Router {
        let state = Arc::new(RouteState {
            sessions: Arc::clone(&self.sessions),
            metadata: self.metadata.clone(),
        });
        create_router(state).layer(TraceLayer::new_for_http())
    }

    /// Validates the session carried by `headers`, web or mobile.
    ///
    /// Failures are logged and reported as an invalid session.
    pub async fn validate_session(&self, headers: &HeaderMap) -> SessionValidation {
        match validate_request(self.sessions.as_ref(), headers).await {
            Ok(validation) => validation,
            Err(e) => {
                error!(error = %e, "session validation failed");
                SessionValidation::invalid()
            }
        }
    }

    /// Requires a valid session on every route of `router`.
    pub fn protect<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(from_fn_with_state(Arc::clone(&self.sessions), require_session))
    }

    /// The client metadata document.
    #[must_use]
    pub const fn client_metadata(&self) -> &ClientMetadata {
        &self.metadata
    }

    /// The session manager.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<dyn OAuthSessions> {
        &self.sessions
    }

    /// The storage shared with the session manager.
    #[must_use]
    pub const fn storage(&self) -> &Arc<dyn OAuthStorage> {
        &self.storage
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &OAuthConfig {
        &self.config
    }
}
