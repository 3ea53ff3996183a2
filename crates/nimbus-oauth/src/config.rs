//! Integration configuration.
//!
//! [`OAuthConfig`] can only be obtained through [`OAuthConfigBuilder::build`],
//! so a value in hand is always validated and fully defaulted.

use std::fmt;

use tracing::warn;
use url::Url;

use crate::error::{OAuthError, Result};

/// Mobile callback scheme used when none is configured.
pub const DEFAULT_MOBILE_SCHEME: &str = "app://auth-callback";

/// OAuth scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "atproto transition:generic";

/// Environment variable consulted for the cookie secret.
pub const COOKIE_SECRET_ENV: &str = "COOKIE_SECRET";

/// Cookie secret used when nothing else is configured. Not for production.
pub const DEV_COOKIE_SECRET: &str = "default-secret-for-development-only";

/// Validated configuration for the OAuth integration.
#[derive(Clone)]
pub struct OAuthConfig {
    base_url: String,
    app_name: String,
    mobile_scheme: String,
    logo_uri: Option<String>,
    policy_uri: Option<String>,
    cookie_secret: String,
    scope: String,
}

impl OAuthConfig {
    /// Starts a builder with the two required settings.
    #[must_use]
    pub fn builder(base_url: impl Into<String>, app_name: impl Into<String>) -> OAuthConfigBuilder {
        OAuthConfigBuilder {
            base_url: base_url.into(),
            app_name: app_name.into(),
            mobile_scheme: None,
            logo_uri: None,
            policy_uri: None,
            cookie_secret: None,
            scope: None,
        }
    }

    /// Public base URL of the application, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Display name shown on the consent screen.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// URL scheme mobile clients are redirected to after login.
    #[must_use]
    pub fn mobile_scheme(&self) -> &str {
        &self.mobile_scheme
    }

    /// Logo shown on the consent screen.
    #[must_use]
    pub fn logo_uri(&self) -> Option<&str> {
        self.logo_uri.as_deref()
    }

    /// Privacy policy link.
    #[must_use]
    pub fn policy_uri(&self) -> Option<&str> {
        self.policy_uri.as_deref()
    }

    /// Secret used to sign session cookies.
    #[must_use]
    pub fn cookie_secret(&self) -> &str {
        &self.cookie_secret
    }

    /// Requested OAuth scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Client identifier: the URL the client metadata is served from.
    #[must_use]
    pub fn client_id(&self) -> String {
        format!("{}/oauth-client-metadata.json", self.base_url)
    }

    /// Redirect URI registered for the authorization callback.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}/oauth/callback", self.base_url)
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("base_url", &self.base_url)
            .field("app_name", &self.app_name)
            .field("mobile_scheme", &self.mobile_scheme)
            .field("logo_uri", &self.logo_uri)
            .field("policy_uri", &self.policy_uri)
            .field("cookie_secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Builder for [`OAuthConfig`].
#[derive(Debug, Clone)]
#[must_use]
pub struct OAuthConfigBuilder {
    base_url: String,
    app_name: String,
    mobile_scheme: Option<String>,
    logo_uri: Option<String>,
    policy_uri: Option<String>,
    cookie_secret: Option<String>,
    scope: Option<String>,
}

impl OAuthConfigBuilder {
    /// Sets the mobile callback scheme.
    pub fn mobile_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.mobile_scheme = Some(scheme.into());
        self
    }

    /// Sets the logo URL.
    pub fn logo_uri(mut self, uri: impl Into<String>) -> Self {
        self.logo_uri = Some(uri.into());
        self
    }

    /// Sets the privacy policy URL.
    pub fn policy_uri(mut self, uri: impl Into<String>) -> Self {
        self.policy_uri = Some(uri.into());
        self
    }

    /// Sets the cookie signing secret explicitly.
    pub fn cookie_secret(mut self, secret: impl Into<String>) -> Self {
        self.cookie_secret = Some(secret.into());
        self
    }

    /// Sets the OAuth scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Validates and finalizes the configuration.
    ///
    /// One trailing `/` is stripped from the base URL. Empty optional
    /// values are treated as unset.
    ///
    /// # Errors
    /// Returns [`OAuthError::MissingBaseUrl`] or [`OAuthError::MissingAppName`]
    /// when a required value is empty, and [`OAuthError::InvalidBaseUrl`]
    /// when the base URL does not parse.
    pub fn build(self) -> Result<OAuthConfig> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(OAuthError::MissingBaseUrl);
        }
        if self.app_name.trim().is_empty() {
            return Err(OAuthError::MissingAppName);
        }

        let base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();
        Url::parse(&base_url)?;

        let cookie_secret = resolve_cookie_secret(
            non_empty(self.cookie_secret),
            non_empty(std::env::var(COOKIE_SECRET_ENV).ok()),
        );

        Ok(OAuthConfig {
            base_url,
            app_name: self.app_name,
            mobile_scheme: non_empty(self.mobile_scheme)
                .unwrap_or_else(|| DEFAULT_MOBILE_SCHEME.to_string()),
            logo_uri: non_empty(self.logo_uri),
            policy_uri: non_empty(self.policy_uri),
            cookie_secret,
            scope: non_empty(self.scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        })
    }
}

/// Picks the cookie secret: explicit value, then environment, then the
/// development default.
#[must_use]
pub fn resolve_cookie_secret(explicit: Option<String>, env: Option<String>) -> String {
    explicit.or(env).unwrap_or_else(|| {
        warn!(
            "no cookie secret configured, set {} in production",
            COOKIE_SECRET_ENV
        );
        DEV_COOKIE_SECRET.to_string()
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
