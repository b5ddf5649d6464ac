//! Cache-policy engine for one worker version.
//!
//! ### Install
//! - Open the namespace named by the version tag.
//! - Fetch every manifest path; any failure or non-2xx status aborts the install.
//! - Commit all entries in one batch, then ask the driver to skip waiting.
//!
//! ### Activate
//! - Delete every namespace except the current one, concurrently and best effort.
//! - Ask the driver to claim open clients.
//!
//! ### Fetch
//! - Non-`GET` requests pass through untouched.
//! - Cache hit: serve it, no network.
//! - Miss: fetch; basic 200 responses are stored by a detached task.
//! - Network failure: offline page for navigations, synthetic 408 otherwise.

mod driver;
mod registration;
mod state;

#[cfg(test)]
pub(crate) mod stub;

pub use driver::{DriverFlags, LifecycleDriver};
pub use registration::{Registration, RegistrationStatus, WorkerSummary};
pub use state::WorkerState;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::Error;
use crate::cache::{CacheStore, CachedEntry};
use crate::config::WorkerConfig;
use crate::http::{Request, RequestKey, Response};
use crate::transport::Transport;

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Cache,
    Network,
    OfflineFallback,
    Synthetic,
}

/// A fetch signal's answer.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub response: Response,
    pub source: ResponseSource,
}

impl Resolved {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// What the worker did with an intercepted request.
#[derive(Debug, Clone)]
pub enum FetchDisposition {
    /// Not intercepted; the driver must perform the request itself.
    Passthrough(Request),
    Respond(Resolved),
}

/// Outcome of stale namespace cleanup during activate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Lifecycle signal delivered by the driver.
#[derive(Debug, Clone)]
pub enum Signal {
    Install,
    Activate,
    Fetch(Request),
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Install => "install",
            Signal::Activate => "activate",
            Signal::Fetch(_) => "fetch",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SignalOutcome {
    Installed,
    Activated(ActivateReport),
    Fetch(FetchDisposition),
}

/// One version of the cache-policy engine.
pub struct ServiceWorker {
    id: u64,
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    state: RwLock<WorkerState>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceWorker {
    pub fn new(config: WorkerConfig, store: Arc<dyn CacheStore>, transport: Arc<dyn Transport>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            config,
            store,
            transport,
            state: RwLock::new(WorkerState::Parsed),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cache_name(&self) -> &str {
        self.config.cache_name()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Deliver a lifecycle signal and resolve once the worker has finished with it.
    pub async fn dispatch(&self, signal: Signal, driver: &dyn LifecycleDriver) -> Result<SignalOutcome, Error> {
        tracing::trace!(worker = self.id, signal = signal.name(), "dispatching signal");
        match signal {
            Signal::Install => self.install(driver).await.map(|()| SignalOutcome::Installed),
            Signal::Activate => self.activate(driver).await.map(SignalOutcome::Activated),
            Signal::Fetch(request) => self.fetch(request).await.map(SignalOutcome::Fetch),
        }
    }

    /// Pre-cache the manifest into the current namespace.
    ///
    /// # Errors
    ///
    /// Fails without committing anything if any manifest resource cannot be
    /// fetched, returns a non-2xx status, or the store rejects the batch.
    /// The worker is then redundant.
    pub async fn install(&self, driver: &dyn LifecycleDriver) -> Result<(), Error> {
        self.advance(WorkerState::Parsed, WorkerState::Installing, "install").await?;
        tracing::info!(worker = self.id, cache = self.cache_name(), "installing");

        match self.precache().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed).await;
                tracing::info!(worker = self.id, cache = self.cache_name(), entries = count, "installed");
                if self.config.skip_waiting() {
                    driver.skip_waiting();
                }
                Ok(())
            }
            Err(err) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::error!(worker = self.id, cache = self.cache_name(), error = %err, "install failed");
                Err(err)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        self.store.open(self.cache_name()).await?;

        let requests = self.config.manifest_requests();
        let fetched = try_join_all(requests.iter().map(|request| self.fetch_manifest_entry(request))).await?;

        self.store.put_all(self.cache_name(), &fetched).await?;
        Ok(fetched.len())
    }

    async fn fetch_manifest_entry(&self, request: &Request) -> Result<(RequestKey, Response), Error> {
        let path = request.url.path().to_string();
        let response = self
            .transport
            .fetch(request)
            .await
            .map_err(|e| Error::ManifestFetch { path: path.clone(), reason: e.to_string() })?;

        if !response.ok() {
            return Err(Error::ManifestFetch { path, reason: format!("status {}", response.status) });
        }

        Ok((request.key(), response))
    }

    /// Remove every namespace but the current one and claim clients.
    ///
    /// Deletion failures are logged and reported, never returned.
    pub async fn activate(&self, driver: &dyn LifecycleDriver) -> Result<ActivateReport, Error> {
        self.advance(WorkerState::Installed, WorkerState::Activating, "activate").await?;

        let report = self.remove_stale_namespaces().await;

        self.set_state(WorkerState::Activated).await;
        tracing::info!(
            worker = self.id,
            cache = self.cache_name(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "activated"
        );
        driver.claim_clients();
        Ok(report)
    }

    async fn remove_stale_namespaces(&self) -> ActivateReport {
        let current = self.cache_name();
        let names = match self.store.keys().await {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(worker = self.id, error = %err, "could not list caches; skipping cleanup");
                return ActivateReport::default();
            }
        };

        let deletions = names.into_iter().filter(|name| name != current).map(|name| async move {
            let result = self.store.delete(&name).await;
            (name, result)
        });

        let mut report = ActivateReport::default();
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(true) => {
                    tracing::debug!(worker = self.id, cache = %name, "deleted stale cache");
                    report.deleted.push(name);
                }
                Ok(false) => tracing::debug!(worker = self.id, cache = %name, "stale cache already gone"),
                Err(err) => {
                    tracing::warn!(worker = self.id, cache = %name, error = %err, "failed to delete stale cache");
                    report.failed.push(name);
                }
            }
        }
        report
    }

    /// Resolve an intercepted request.
    ///
    /// Always answers a retrieval request; the only error is delivering a
    /// fetch to a worker that is not activated.
    pub async fn fetch(&self, request: Request) -> Result<FetchDisposition, Error> {
        let state = self.state().await;
        if !state.can_intercept_fetch() {
            return Err(Error::InvalidState { signal: "fetch", state });
        }

        if !request.method.is_retrieval() {
            tracing::debug!(worker = self.id, method = %request.method, url = %request.url, "not intercepting");
            return Ok(FetchDisposition::Passthrough(request));
        }

        Ok(FetchDisposition::Respond(self.resolve(request).await))
    }

    async fn resolve(&self, request: Request) -> Resolved {
        let key = request.key();

        if let Some(entry) = self.lookup(&key).await {
            tracing::debug!(worker = self.id, key = %key, "cache hit");
            return Resolved::new(entry.response, ResponseSource::Cache);
        }

        match self.transport.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.populate(key, response.clone()).await;
                } else {
                    tracing::debug!(
                        worker = self.id,
                        key = %key,
                        status = response.status,
                        kind = response.kind.as_str(),
                        "not caching response"
                    );
                }
                Resolved::new(response, ResponseSource::Network)
            }
            Err(err) => {
                tracing::warn!(worker = self.id, key = %key, error = %err, "network fetch failed");
                self.fallback(&request).await
            }
        }
    }

    /// Store lookup where a failing store counts as a miss.
    async fn lookup(&self, key: &RequestKey) -> Option<CachedEntry> {
        match self.store.match_entry(self.cache_name(), key).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(worker = self.id, key = %key, error = %err, "cache lookup failed");
                None
            }
        }
    }

    async fn fallback(&self, request: &Request) -> Resolved {
        if request.is_navigation() {
            let offline = self.config.offline_key();
            if let Some(entry) = self.lookup(&offline).await {
                return Resolved::new(entry.response, ResponseSource::OfflineFallback);
            }
            tracing::warn!(worker = self.id, key = %offline, "offline page missing from cache");
        }
        Resolved::new(Response::synthetic_timeout(), ResponseSource::Synthetic)
    }

    /// Store a snapshot in a detached task. The caller is never blocked on it.
    async fn populate(&self, key: RequestKey, response: Response) {
        let store = Arc::clone(&self.store);
        let cache_name = self.cache_name().to_string();
        let handle = tokio::spawn(async move {
            match store.put(&cache_name, &key, &response).await {
                Ok(()) => tracing::debug!(cache = %cache_name, key = %key, "cached network response"),
                Err(err) => {
                    tracing::warn!(cache = %cache_name, key = %key, error = %err, "failed to cache network response")
                }
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every background cache write started so far.
    pub async fn settle(&self) {
        let handles = std::mem::take(&mut *self.pending.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(worker = self.id, error = %err, "cache write task panicked");
            }
        }
    }

    pub(crate) async fn retire(&self) {
        self.set_state(WorkerState::Redundant).await;
        tracing::info!(worker = self.id, cache = self.cache_name(), "worker is redundant");
    }

    async fn advance(&self, from: WorkerState, to: WorkerState, signal: &'static str) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState { signal, state: *state });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("id", &self.id)
            .field("cache_name", &self.cache_name())
            .finish_non_exhaustive()
    }
}
