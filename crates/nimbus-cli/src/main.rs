//! Nimbus OAuth CLI tools.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "AT Protocol OAuth client metadata and session storage tools", long_about = None)]
struct Cli {
    /// Path to a `.env` file, loaded before the other arguments are read
    #[arg(long, global = true)]
    env_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the OAuth client metadata document
    Metadata {
        /// Public base URL of the application
        #[arg(long, env = "BASE_URL")]
        base_url: String,
        /// Display name shown on the consent screen
        #[arg(long, env = "APP_NAME")]
        app_name: String,
        /// Logo URL
        #[arg(long, env = "LOGO_URI")]
        logo_uri: Option<String>,
        /// Privacy policy URL
        #[arg(long, env = "POLICY_URI")]
        policy_uri: Option<String>,
        /// OAuth scope
        #[arg(long, env = "OAUTH_SCOPE")]
        scope: Option<String>,
    },
    /// Inspect and maintain a `SQLite` session store
    Store {
        /// Path to `SQLite` database
        #[arg(long, env = "NIMBUS_DB", default_value = "oauth.db")]
        db: String,
        #[command(subcommand)]
        action: StoreCommands,
    },
    /// Apply the storage schema migrations to a database
    Migrate {
        /// Database URL, e.g. `sqlite://oauth.db?mode=rwc`
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Print the value stored under a key
    Get {
        /// The key to read
        key: String,
    },
    /// Store a value under a key
    Set {
        /// The key to write
        key: String,
        /// The value; stored as a string unless `--json` is given
        value: String,
        /// Parse the value as JSON
        #[arg(long)]
        json: bool,
        /// Expire the record after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },
    /// Check whether a live record exists for a key
    Has {
        /// The key to check
        key: String,
    },
    /// List all live keys
    Keys,
    /// Remove every record
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Purge expired records
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file before clap parses args so env vars are available for clap's `env` attribute.
    load_env_file();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nimbus=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(path) = cli.env_file.as_deref() {
        tracing::debug!(path, "environment loaded from env file");
    }

    match cli.command {
        Commands::Metadata {
            base_url,
            app_name,
            logo_uri,
            policy_uri,
            scope,
        } => commands::metadata::run(commands::metadata::MetadataArgs {
            base_url,
            app_name,
            logo_uri,
            policy_uri,
            scope,
        }),
        Commands::Store { db, action } => {
            let storage = nimbus_store::SqliteStorage::open(&db)?;
            match action {
                StoreCommands::Get { key } => commands::store::get(&storage, &key).await,
                StoreCommands::Set {
                    key,
                    value,
                    json,
                    ttl,
                } => commands::store::set(&storage, &key, &value, json, ttl).await,
                StoreCommands::Delete { key } => commands::store::delete(&storage, &key).await,
                StoreCommands::Has { key } => commands::store::has(&storage, &key).await,
                StoreCommands::Keys => commands::store::keys(&storage).await,
                StoreCommands::Clear { yes } => commands::store::clear(&storage, yes).await,
                StoreCommands::Cleanup => commands::store::cleanup(&storage).await,
            }
        }
        Commands::Migrate { database_url } => commands::migrate::run(&database_url).await,
    }
}

/// Loads environment variables from a `.env` file.
///
/// Checks for `--env-file <path>` in argv first; falls back to `.env` in the
/// current directory. Silently ignores a missing default file.
fn load_env_file() {
    let args: Vec<String> = std::env::args().collect();
    let custom_path = args
        .windows(2)
        .find(|w| w[0] == "--env-file")
        .map(|w| w[1].clone());

    if let Some(path) = custom_path {
        if let Err(e) = dotenvy::from_filename(&path) {
            eprintln!("Warning: failed to load env file {path}: {e}");
        }
    } else {
        let _ = dotenvy::dotenv();
    }
}
