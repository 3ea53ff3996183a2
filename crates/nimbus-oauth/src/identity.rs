//! Login identifier validation.
//!
//! A user starts login with either a handle (`alice.bsky.social`) or a DID.
//! Identifiers are checked syntactically before the session manager is
//! asked to resolve them.

use crate::error::{OAuthError, Result};

/// Strips surrounding whitespace and one leading `@`.
#[must_use]
pub fn normalize_identifier(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

/// Checks handle syntax: a domain name with at least two labels.
#[must_use]
pub fn is_valid_handle(handle: &str) -> bool {
    if handle.is_empty() || handle.len() > 253 {
        return false;
    }

    if !handle.contains('.') || handle.starts_with('.') || handle.ends_with('.') {
        return false;
    }

    handle.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Checks DID syntax for the `plc` and `web` methods.
#[must_use]
pub fn is_valid_did(did: &str) -> bool {
    if let Some(id) = did.strip_prefix("did:plc:") {
        return !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric());
    }
    if let Some(id) = did.strip_prefix("did:web:") {
        return is_valid_web_identifier(id);
    }
    false
}

/// A `did:web` identifier is a host, with any port colon encoded as `%3A`,
/// followed by zero or more `:`-separated path segments.
fn is_valid_web_identifier(id: &str) -> bool {
    let mut segments = id.split(':');
    let host = segments.next().unwrap_or_default();
    is_valid_web_host(host) && segments.all(is_valid_path_segment)
}

fn is_valid_web_host(host: &str) -> bool {
    let decoded = host.replace("%3A", ":").replace("%3a", ":");
    let (name, port) = match decoded.split_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (decoded.as_str(), None),
    };

    let port_ok = port.map_or(true, |p| !p.is_empty() && p.parse::<u16>().is_ok());
    port_ok && (name == "localhost" || is_valid_handle(name))
}

fn is_valid_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b'%'))
}

/// Normalizes a login identifier and checks that it is a handle or DID.
///
/// # Errors
/// Returns [`OAuthError::InvalidHandle`] if the identifier is neither.
pub fn validate_identifier(input: &str) -> Result<String> {
    let identifier = normalize_identifier(input);
    if is_valid_handle(identifier) || is_valid_did(identifier) {
        Ok(identifier.to_string())
    } else {
        Err(OAuthError::InvalidHandle(input.to_string()))
    }
}
