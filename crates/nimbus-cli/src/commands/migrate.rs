//! Schema migration command.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use nimbus_store::pooled::MIGRATOR;
use nimbus_store::PooledStorage;

/// Applies the bundled storage migrations to `database_url`.
///
/// # Errors
/// Returns an error if the database cannot be reached or a migration fails.
pub async fn run(database_url: &str) -> Result<()> {
    println!("{}", style("Storage Migration").bold().cyan());
    println!();
    println!("Database: {}", style(database_url).yellow());
    println!();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    spinner.set_message("Connecting...");
    let storage = PooledStorage::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    spinner.set_message("Applying migrations...");
    MIGRATOR
        .run(storage.pool())
        .await
        .context("Failed to apply migrations")?;

    spinner.finish_with_message("Migrations applied");
    tracing::info!(migrations = MIGRATOR.iter().count(), "storage schema up to date");

    println!();
    println!("{}", style("Schema is up to date.").bold().green());
    Ok(())
}
