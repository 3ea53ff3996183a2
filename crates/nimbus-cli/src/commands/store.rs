//! Session store maintenance commands.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use nimbus_store::{OAuthStorage, SetOptions};
use serde_json::Value;

/// Prints the value stored under `key`.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub async fn get(storage: &dyn OAuthStorage, key: &str) -> Result<()> {
    match storage.get(key).await? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{}", style(format!("No live record for {key}")).yellow()),
    }
    Ok(())
}

/// Stores `raw` under `key`.
///
/// # Errors
/// Returns an error if `--json` is given and the value does not parse, or
/// if the write fails.
pub async fn set(
    storage: &dyn OAuthStorage,
    key: &str,
    raw: &str,
    json: bool,
    ttl_secs: Option<u64>,
) -> Result<()> {
    let value = parse_value(raw, json)?;
    let options = SetOptions {
        ttl: ttl_secs.map(Duration::from_secs),
    };
    storage.set(key, value, options).await?;

    match ttl_secs {
        Some(secs) => println!("{} {key} (expires in {secs}s)", style("Stored").green()),
        None => println!("{} {key}", style("Stored").green()),
    }
    Ok(())
}

/// Deletes `key`.
///
/// # Errors
/// Returns an error if the delete fails.
pub async fn delete(storage: &dyn OAuthStorage, key: &str) -> Result<()> {
    storage.delete(key).await?;
    println!("{} {key}", style("Deleted").green());
    Ok(())
}

/// Prints whether a live record exists for `key`.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub async fn has(storage: &dyn OAuthStorage, key: &str) -> Result<()> {
    println!("{}", storage.has_item(key).await?);
    Ok(())
}

/// Lists every live key, sorted.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub async fn keys(storage: &dyn OAuthStorage) -> Result<()> {
    let mut keys = storage.keys().await?;
    keys.sort();
    for key in &keys {
        println!("{key}");
    }
    eprintln!("{}", style(format!("{} live keys", keys.len())).dim());
    Ok(())
}

/// Removes every record after confirmation.
///
/// # Errors
/// Returns an error if the prompt or the delete fails.
pub async fn clear(storage: &dyn OAuthStorage, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "{}",
            style("This removes every stored session and token.").bold().yellow()
        );
        let confirm = Confirm::new()
            .with_prompt("Clear the store?")
            .default(false)
            .interact()?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    storage.clear().await?;
    println!("{}", style("Store cleared.").bold().green());
    Ok(())
}

/// Purges expired records.
///
/// # Errors
/// Returns an error if the delete fails.
pub async fn cleanup(storage: &dyn OAuthStorage) -> Result<()> {
    let removed = storage.cleanup().await?;
    println!(
        "{} {removed} expired record{}",
        style("Removed").green(),
        if removed == 1 { "" } else { "s" }
    );
    Ok(())
}

fn parse_value(raw: &str, json: bool) -> Result<Value> {
    if json {
        serde_json::from_str(raw).context("value is not valid JSON")
    } else {
        Ok(Value::String(raw.to_string()))
    }
}
