//! CLI subcommands.

pub mod metadata;
pub mod migrate;
pub mod store;
