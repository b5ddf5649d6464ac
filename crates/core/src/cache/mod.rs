//! SQLite-backed cache storage for captured responses.
//!
//! This module provides the durable store the engine caches into, using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Versioned namespaces, deleted with all their entries in one statement
//! - Whole-response snapshots keyed by SHA-256 of the request identity
//! - Atomic batch writes for install-time pre-population
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use store::CacheStore;
