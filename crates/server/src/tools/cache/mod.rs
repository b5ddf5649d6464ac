//! Cache-related MCP tools.
//!
//! This module provides read-only tools for inspecting the SQLite cache.

pub mod get;
pub mod keys;

pub use get::{CacheGetParams, get_impl};
pub use keys::keys_impl;
