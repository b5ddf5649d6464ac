//! Fixtures shared by the tool tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use url::Url;

use pwa_core::{
    CacheDb, Error, Registration, Request, ResourceManifest, Response, Transport, WorkerConfig,
    config::DEFAULT_OFFLINE_PATH,
};

pub(crate) const ORIGIN: &str = "https://app.test";

pub(crate) fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub(crate) fn base_config() -> WorkerConfig {
    WorkerConfig::new(origin(), "v1", ResourceManifest::default(), DEFAULT_OFFLINE_PATH).unwrap()
}

/// Answers every same-origin URL with `ok <path>`; other origins get 404.
#[derive(Default)]
pub(crate) struct EchoTransport {
    offline: AtomicBool,
}

impl EchoTransport {
    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for EchoTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }
        if request.url.origin() != origin().origin() {
            return Ok(Response::new(404, "not found"));
        }
        Ok(Response::new(200, format!("ok {}", request.url.path()))
            .with_status_text("OK")
            .with_header("Content-Type", "text/plain")
            .with_url(request.url.clone()))
    }
}

pub(crate) async fn fixture() -> (Arc<CacheDb>, Arc<EchoTransport>, Registration) {
    let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let transport = Arc::new(EchoTransport::default());
    let registration = Registration::new(store.clone(), transport.clone());
    (store, transport, registration)
}

/// First text content of a tool result, parsed as JSON.
pub(crate) fn output_json(result: &rmcp::model::CallToolResult) -> serde_json::Value {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
