//! The network seam used by the engine.

use async_trait::async_trait;

use crate::Error;
use crate::http::{Request, Response};

/// Fallible asynchronous network fetch.
///
/// Any HTTP status is a successful fetch. Only failing to obtain a response
/// at all (connection refused, timeout, oversized body) is an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
