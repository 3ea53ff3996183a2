//! Shared table layout.
//!
//! Every SQL backend reads and writes the same table, so a database written
//! by one backend can be served by another:
//!
//! ```sql
//! CREATE TABLE iron_session_storage (
//!     key TEXT PRIMARY KEY,
//!     value TEXT NOT NULL,
//!     expires_at INTEGER,
//!     created_at INTEGER NOT NULL,
//!     updated_at INTEGER NOT NULL
//! );
//! CREATE INDEX idx_iron_session_storage_expires_at
//!     ON iron_session_storage(expires_at);
//! ```
//!
//! All timestamps are epoch milliseconds. `expires_at` is `NULL` for records
//! that never expire.

/// Table name.
pub const TABLE: &str = "iron_session_storage";

/// Index on [`EXPIRES_AT`] used by cleanup.
pub const EXPIRES_AT_INDEX: &str = "idx_iron_session_storage_expires_at";

/// Primary key column.
pub const KEY: &str = "key";

/// Encoded value column.
pub const VALUE: &str = "value";

/// Absolute expiry column, nullable.
pub const EXPIRES_AT: &str = "expires_at";

/// Insert time, untouched by later writes to the same key.
pub const CREATED_AT: &str = "created_at";

/// Time of the most recent write.
pub const UPDATED_AT: &str = "updated_at";

/// Timestamp columns that older databases may hold as text.
pub const TIMESTAMP_COLUMNS: [&str; 3] = [EXPIRES_AT, CREATED_AT, UPDATED_AT];
