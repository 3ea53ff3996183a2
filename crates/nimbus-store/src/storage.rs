//! Storage contract, write options and the value codec.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Options for a single write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Time-to-live measured from the moment of the write.
    ///
    /// `None` means the record never expires. A zero TTL stores a record
    /// that is already expired, not one that lives forever.
    pub ttl: Option<Duration>,
}

impl SetOptions {
    /// Options for a record that expires `ttl` after it is written.
    #[must_use]
    pub const fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }

    /// Converts the TTL into an absolute expiry in epoch milliseconds.
    #[must_use]
    pub fn expires_at(&self, now_ms: i64) -> Option<i64> {
        self.ttl.map(|ttl| {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            now_ms.saturating_add(ttl_ms)
        })
    }
}

/// Key-value store with optional per-key expiry.
///
/// Keys are opaque strings chosen by the session manager. A record whose
/// expiry is at or before the current time reads as absent from every
/// method; backends may evict it lazily or leave it for [`cleanup`].
///
/// Implementations must be thread-safe and handle concurrent access.
///
/// [`cleanup`]: OAuthStorage::cleanup
#[async_trait]
pub trait OAuthStorage: Send + Sync {
    /// Returns the live value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any existing record.
    async fn set(&self, key: &str, value: Value, options: SetOptions) -> Result<()>;

    /// Removes the record for `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Checks whether a live record exists for `key`.
    async fn has_item(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Lists every key whose record has not expired.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Removes every record.
    async fn clear(&self) -> Result<()>;

    /// Physically removes expired records, returning how many were purged.
    async fn cleanup(&self) -> Result<u64>;
}

/// Typed access on top of the JSON value contract.
#[async_trait]
pub trait StorageExt: OAuthStorage {
    /// Reads `key` and deserializes it into `T`.
    async fn get_as<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serializes `value` and stores it under `key`.
    async fn set_as<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, options).await
    }
}

impl<S: OAuthStorage + ?Sized> StorageExt for S {}

/// Encodes a value for a text column.
///
/// JSON strings are stored verbatim; everything else is JSON-encoded.
///
/// # Errors
/// Returns an error if the value cannot be serialized.
pub fn encode_value(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

/// Decodes a text column back into a value.
///
/// Text that is not valid JSON comes back unchanged as a string.
#[must_use]
pub fn decode_value(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}

/// Current time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
