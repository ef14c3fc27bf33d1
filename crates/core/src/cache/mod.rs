//! SQLite-backed cache storage with named partitions.
//!
//! This module stands in for the browser cache storage API. It provides:
//!
//! - Named partitions (open, list, delete)
//! - Request-keyed entries using SHA-256 of method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Atomic bulk insert for install-time population

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntryMeta;
pub use partitions::Partition;
