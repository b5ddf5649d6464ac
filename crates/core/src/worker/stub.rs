//! Test doubles for the store and transport seams.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::Error;
use crate::cache::{CacheDb, CacheStore, CachedEntry};
use crate::config::{DEFAULT_MANIFEST, DEFAULT_OFFLINE_PATH, ResourceManifest, WorkerConfig};
use crate::http::{Request, RequestKey, Response};
use crate::transport::Transport;

pub(crate) const ORIGIN: &str = "https://app.test";

/// Resolve a path against the test origin; absolute URLs are used as is.
pub(crate) fn url(path_or_url: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path_or_url).unwrap()
}

pub(crate) fn test_config(cache_name: &str) -> WorkerConfig {
    WorkerConfig::new(url("/"), cache_name, ResourceManifest::default(), DEFAULT_OFFLINE_PATH).unwrap()
}

/// Transport serving canned responses by URL and counting calls.
#[derive(Default)]
pub(crate) struct StubTransport {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StubTransport {
    /// Every default manifest path answers 200 with `body of <path>`.
    pub(crate) fn serving_manifest() -> Self {
        let transport = Self::default();
        for path in DEFAULT_MANIFEST {
            transport.route(path, Response::new(200, format!("body of {path}")).with_status_text("OK"));
        }
        transport
    }

    pub(crate) fn route(&self, path_or_url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url(path_or_url).to_string(), response);
    }

    pub(crate) fn fail(&self, path_or_url: &str) {
        self.failing.lock().unwrap().insert(url(path_or_url).to_string());
    }

    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let target = request.url.to_string();
        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&target) {
            return Err(Error::Network(format!("connection refused: {target}")));
        }

        let response = self.routes.lock().unwrap().get(&target).cloned();
        let response = response.unwrap_or_else(|| Response::new(404, "not found"));
        Ok(response.with_url(request.url.clone()))
    }
}

/// SQLite store whose operations can be made to fail on demand.
pub(crate) struct FailingStore {
    inner: CacheDb,
    fail_match: AtomicBool,
    fail_put: AtomicBool,
    fail_put_all: AtomicBool,
    fail_delete: Mutex<HashSet<String>>,
    put_delay_ms: AtomicU64,
}

impl FailingStore {
    pub(crate) async fn new() -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            fail_match: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
            fail_put_all: AtomicBool::new(false),
            fail_delete: Mutex::new(HashSet::new()),
            put_delay_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn inner(&self) -> &CacheDb {
        &self.inner
    }

    pub(crate) fn fail_match(&self) {
        self.fail_match.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_put(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_put_all(&self) {
        self.fail_put_all.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, namespace: &str) {
        self.fail_delete.lock().unwrap().insert(namespace.to_string());
    }

    /// Hold every single-entry write for `delay` before committing it.
    pub(crate) fn slow_put(&self, delay: Duration) {
        self.put_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn quota() -> Error {
        Error::Database(tokio_rusqlite::Error::ConnectionClosed)
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn open(&self, namespace: &str) -> Result<(), Error> {
        self.inner.open_namespace(namespace).await
    }

    async fn match_entry(&self, namespace: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error> {
        if self.fail_match.load(Ordering::SeqCst) {
            return Err(Self::quota());
        }
        self.inner.get_entry(namespace, key).await
    }

    async fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let delay = self.put_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::quota());
        }
        self.inner.put_entry(namespace, key, response).await
    }

    async fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        if self.fail_put_all.load(Ordering::SeqCst) {
            return Err(Self::quota());
        }
        self.inner.put_entries(namespace, entries).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.namespace_names().await
    }

    async fn delete(&self, namespace: &str) -> Result<bool, Error> {
        if self.fail_delete.lock().unwrap().contains(namespace) {
            return Err(Self::quota());
        }
        self.inner.delete_namespace(namespace).await
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.list_entries(namespace).await
    }
}
