//! Core types and shared functionality for mbm-sw.
//!
//! This crate provides:
//! - Request/response model shared by the fetch pipeline and the cache
//! - Cache storage with named partitions on a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, EntryMeta, Partition};
pub use config::{AppConfig, CacheLayout};
pub use error::Error;
pub use http::{Request, Response};
