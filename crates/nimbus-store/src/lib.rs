//! TTL-aware key-value storage for AT Protocol OAuth sessions.
//!
//! This crate provides the storage contract used by the OAuth session
//! manager, and three interchangeable backends:
//! - [`MemoryStorage`] - in-process map for development and tests
//! - [`SqliteStorage`] - raw `SQLite` via rusqlite, self-creating schema
//! - [`PooledStorage`] - sqlx pool with query-builder statements, schema
//!   provisioned by migrations
//!
//! All backends share the `iron_session_storage` table layout described in
//! [`schema`] and store values with the codec in [`storage`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod pooled;
pub mod schema;
pub mod sqlite;
pub mod storage;

pub use error::{Result, StoreError};
pub use memory::MemoryStorage;
pub use pooled::PooledStorage;
pub use sqlite::SqliteStorage;
pub use storage::{OAuthStorage, SetOptions, StorageExt};
