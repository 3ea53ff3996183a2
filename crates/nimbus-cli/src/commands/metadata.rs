//! Client metadata command.

use anyhow::Result;
use nimbus_oauth::{generate_client_metadata, OAuthConfig};

/// Arguments for the metadata command.
pub struct MetadataArgs {
    /// Public base URL of the application.
    pub base_url: String,
    /// Display name.
    pub app_name: String,
    /// Logo URL.
    pub logo_uri: Option<String>,
    /// Privacy policy URL.
    pub policy_uri: Option<String>,
    /// OAuth scope.
    pub scope: Option<String>,
}

/// Prints the client metadata document for the given settings.
///
/// # Errors
/// Returns an error if the configuration is invalid.
pub fn run(args: MetadataArgs) -> Result<()> {
    println!("{}", render(args)?);
    Ok(())
}

fn render(args: MetadataArgs) -> Result<String> {
    let mut builder = OAuthConfig::builder(args.base_url, args.app_name)
        // Metadata never includes the cookie secret; skip the env lookup warning.
        .cookie_secret("unused");
    if let Some(logo_uri) = args.logo_uri {
        builder = builder.logo_uri(logo_uri);
    }
    if let Some(policy_uri) = args.policy_uri {
        builder = builder.policy_uri(policy_uri);
    }
    if let Some(scope) = args.scope {
        builder = builder.scope(scope);
    }

    let config = builder.build()?;
    Ok(serde_json::to_string_pretty(&generate_client_metadata(&config))?)
}
