//! Pooled storage backend built on `sqlx`.
//!
//! Statements are assembled with [`QueryBuilder`] from the column names in
//! [`crate::schema`]. This backend never creates or alters tables: the
//! schema ships in `migrations/` and is applied with [`MIGRATOR`] (or
//! `sqlx migrate run`) before the store is used.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row};

use crate::error::Result;
use crate::schema::{CREATED_AT, EXPIRES_AT, KEY, TABLE, UPDATED_AT, VALUE};
use crate::storage::{decode_value, encode_value, now_millis, OAuthStorage, SetOptions};

/// Migrations that provision the storage table.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Storage over a shared `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct PooledStorage {
    pool: SqlitePool,
}

impl PooledStorage {
    /// Wraps an existing pool. The schema must already be migrated.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `url`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Appends `(expires_at IS NULL OR expires_at > now)`.
fn push_live_filter(qb: &mut QueryBuilder<'_, Sqlite>, now: i64) {
    qb.push("(")
        .push(EXPIRES_AT)
        .push(" IS NULL OR ")
        .push(EXPIRES_AT)
        .push(" > ")
        .push_bind(now)
        .push(")");
}

fn select_live<'a>(column: &str, key: &'a str, now: i64) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(column)
        .push(" FROM ")
        .push(TABLE)
        .push(" WHERE ")
        .push(KEY)
        .push(" = ")
        .push_bind(key)
        .push(" AND ");
    push_live_filter(&mut qb, now);
    qb.push(" LIMIT 1");
    qb
}

#[async_trait]
impl OAuthStorage for PooledStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = select_live(VALUE, key, now_millis())
            .build()
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(decode_value(row.try_get::<String, _>(0)?))),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, options: SetOptions) -> Result<()> {
        let encoded = encode_value(&value)?;
        let now = now_millis();
        let expires_at = options.expires_at(now);

        let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        qb.push(TABLE)
            .push(format!(
                " ({KEY}, {VALUE}, {EXPIRES_AT}, {CREATED_AT}, {UPDATED_AT}) VALUES ("
            ));
        let mut values = qb.separated(", ");
        values
            .push_bind(key)
            .push_bind(encoded)
            .push_bind(expires_at)
            .push_bind(now)
            .push_bind(now);
        qb.push(format!(
            ") ON CONFLICT({KEY}) DO UPDATE SET \
             {VALUE} = excluded.{VALUE}, \
             {EXPIRES_AT} = excluded.{EXPIRES_AT}, \
             {UPDATED_AT} = excluded.{UPDATED_AT}"
        ));

        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(TABLE).push(" WHERE ").push(KEY).push(" = ").push_bind(key);
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn has_item(&self, key: &str) -> Result<bool> {
        let row = select_live("1", key, now_millis())
            .build()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        qb.push(KEY).push(" FROM ").push(TABLE).push(" WHERE ");
        push_live_filter(&mut qb, now_millis());

        let rows = qb.build().fetch_all(&self.pool).await?;
        let keys = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(TABLE);
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn cleanup(&self) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(TABLE)
            .push(" WHERE ")
            .push(EXPIRES_AT)
            .push(" IS NOT NULL AND ")
            .push(EXPIRES_AT)
            .push(" <= ")
            .push_bind(now_millis());
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
