//! Client code for pwa-sw.
//!
//! This crate provides the HTTP transport the cache engine fetches through,
//! plus URL canonicalization shared by the server tools.

pub mod fetch;

pub use fetch::{FetchConfig, HttpTransport, UrlError, canonicalize, classify};
