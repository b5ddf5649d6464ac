//! pwa-sw server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use pwa_client::{FetchConfig, HttpTransport};
use pwa_core::{AppConfig, CacheDb, Registration};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let worker_config = config.worker_config()?;

    tracing::info!(
        origin = %worker_config.origin(),
        cache = worker_config.cache_name(),
        db = %config.db_path.display(),
        "Starting pwa-sw server on stdio transport"
    );

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let transport = Arc::new(HttpTransport::new(FetchConfig::from(&config), worker_config.origin().clone())?);
    let registration = Arc::new(Registration::new(store.clone(), transport));

    if let Err(err) = registration.update(worker_config.clone()).await {
        tracing::warn!(error = %err, "initial install failed; serving uncontrolled until sw_install succeeds");
    }

    let handler = handler::PwaServer::new(registration.clone(), store, worker_config);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;
    registration.settle().await;

    Ok(())
}
