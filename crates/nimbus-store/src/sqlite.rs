//! Raw `SQLite` storage backend.
//!
//! Creates its own schema on first use and converts rows left behind by
//! older writers that stored timestamps as text.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::schema::TIMESTAMP_COLUMNS;
use crate::storage::{decode_value, encode_value, now_millis, OAuthStorage, SetOptions};

struct Inner {
    conn: Connection,
    initialized: bool,
}

/// `SQLite` storage for OAuth sessions and tokens.
pub struct SqliteStorage {
    inner: Mutex<Inner>,
}

#[allow(clippy::significant_drop_tightening)]
impl SqliteStorage {
    /// Opens (or creates) a database file.
    ///
    /// The schema is created lazily on the first operation.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Creates a store backed by a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn,
                initialized: false,
            }),
        }
    }

    /// Runs `f` against the connection, creating the schema first if needed.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock();
        if !inner.initialized {
            init_schema(&inner.conn)?;
            migrate_timestamps(&inner.conn);
            inner.initialized = true;
        }
        f(&inner.conn)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS iron_session_storage (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_iron_session_storage_expires_at
            ON iron_session_storage(expires_at);
        ",
    )?;
    Ok(())
}

/// Converts digit-only text timestamps to integers.
///
/// Text compares greater than any integer in `SQLite`, so unconverted rows
/// would never read as expired. Failures are logged and ignored.
fn migrate_timestamps(conn: &Connection) {
    for column in TIMESTAMP_COLUMNS {
        let sql = format!(
            "UPDATE iron_session_storage SET {column} = CAST({column} AS INTEGER)
             WHERE typeof({column}) = 'text' AND {column} NOT GLOB '*[^0-9]*' AND {column} != ''"
        );
        match conn.execute(&sql, []) {
            Ok(0) => {}
            Ok(rows) => debug!(column, rows, "converted text timestamps"),
            Err(e) => warn!(column, error = %e, "timestamp migration failed"),
        }
    }
}

#[async_trait]
impl OAuthStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM iron_session_storage
                     WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
                     LIMIT 1",
                    params![key, now_millis()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;
        Ok(raw.map(decode_value))
    }

    async fn set(&self, key: &str, value: Value, options: SetOptions) -> Result<()> {
        let encoded = encode_value(&value)?;
        let now = now_millis();
        let expires_at = options.expires_at(now);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO iron_session_storage (key, value, expires_at, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     expires_at = excluded.expires_at,
                     updated_at = excluded.updated_at",
                params![key, encoded, expires_at, now, now],
            )?;
            Ok(())
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM iron_session_storage WHERE key = ?", params![key])?;
            Ok(())
        })
    }

    async fn has_item(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM iron_session_storage
                     WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
                     LIMIT 1",
                    params![key, now_millis()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM iron_session_storage
                 WHERE expires_at IS NULL OR expires_at > ?",
            )?;
            let keys = stmt
                .query_map(params![now_millis()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM iron_session_storage", [])?;
            Ok(())
        })
    }

    async fn cleanup(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM iron_session_storage
                 WHERE expires_at IS NOT NULL AND expires_at <= ?",
                params![now_millis()],
            )?;
            Ok(removed as u64)
        })
    }
}
