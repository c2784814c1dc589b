//! SQLite-backed persistent store for cached responses.
//!
//! This module provides the byte store the engine caches into, using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named partitions as key namespaces within one database
//! - Content-addressed row keys (SHA-256 of method and URL)
//! - Atomic whole-entry upserts that never move `stored-at` backwards
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entry;
pub mod key;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::{CachedEntry, STORED_AT_HEADER};
pub use key::CacheKey;
pub use store::PartitionStore;
