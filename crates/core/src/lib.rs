//! Core types and shared functionality for pwa-sw.
//!
//! This crate provides:
//! - The versioned cache-policy engine and its lifecycle driver
//! - Cache implementation with SQLite backend
//! - Request/response model and the network seam
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod worker;

pub use cache::{CacheDb, CacheStore, CachedEntry};
pub use config::{AppConfig, ConfigError, ResourceManifest, WorkerConfig};
pub use error::Error;
pub use http::{Method, Request, RequestKey, RequestMode, Response, ResponseType};
pub use transport::Transport;
pub use worker::{
    ActivateReport, DriverFlags, FetchDisposition, LifecycleDriver, Registration, RegistrationStatus, Resolved,
    ResponseSource, ServiceWorker, Signal, SignalOutcome, WorkerState, WorkerSummary,
};
