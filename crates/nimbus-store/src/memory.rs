//! In-process storage backend.
//!
//! Nothing is persisted; use it for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;
use crate::storage::{now_millis, OAuthStorage, SetOptions};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

/// Storage backed by a `HashMap` behind a `Mutex`.
///
/// Expired entries are evicted when a read encounters them or when
/// [`OAuthStorage::cleanup`] runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, Entry>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns `true` if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    fn live_value(&self, key: &str) -> Option<Value> {
        let mut data = self.data.lock();
        let entry = data.get(key)?;
        if entry.is_expired(now_millis()) {
            data.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }
}

#[async_trait]
impl OAuthStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: Value, options: SetOptions) -> Result<()> {
        let entry = Entry {
            value,
            expires_at: options.expires_at(now_millis()),
        };
        self.data.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }

    async fn has_item(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let now = now_millis();
        let mut data = self.data.lock();
        data.retain(|_, entry| !entry.is_expired(now));
        Ok(data.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.data.lock().clear();
        Ok(())
    }

    async fn cleanup(&self) -> Result<u64> {
        let now = now_millis();
        let mut data = self.data.lock();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired(now));
        Ok((before - data.len()) as u64)
    }
}
