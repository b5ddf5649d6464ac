//! Lifecycle driver for one scope.
//!
//! Plays the part a browser plays for a registered worker: it installs new
//! versions, activates them (immediately when they ask to skip waiting),
//! retires the version they replace, and routes requests to whichever
//! worker controls the scope.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{DriverFlags, FetchDisposition, Resolved, ResponseSource, ServiceWorker, WorkerState};
use crate::Error;
use crate::cache::CacheStore;
use crate::config::WorkerConfig;
use crate::http::{Request, Response};
use crate::transport::Transport;

/// Point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerSummary {
    pub id: u64,
    pub cache_name: String,
    pub state: WorkerState,
}

impl WorkerSummary {
    pub async fn of(worker: &ServiceWorker) -> Self {
        Self { id: worker.id(), cache_name: worker.cache_name().to_string(), state: worker.state().await }
    }
}

/// Point-in-time view of the registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RegistrationStatus {
    pub active: Option<WorkerSummary>,
    pub waiting: Option<WorkerSummary>,
    /// Whether open clients are routed through the active worker.
    pub controlled: bool,
}

#[derive(Default)]
struct Slots {
    active: Option<Arc<ServiceWorker>>,
    waiting: Option<Arc<ServiceWorker>>,
    controlled: bool,
}

/// Installs, activates and routes to workers sharing one store and transport.
pub struct Registration {
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    slots: RwLock<Slots>,
}

impl Registration {
    pub fn new(store: Arc<dyn CacheStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport, slots: RwLock::new(Slots::default()) }
    }

    /// Install a worker for `config` and activate it if it may.
    ///
    /// On install failure the new worker is discarded and the current active
    /// worker, if any, keeps serving; calling `update` again retries.
    pub async fn update(&self, config: WorkerConfig) -> Result<Arc<ServiceWorker>, Error> {
        let worker = Arc::new(ServiceWorker::new(config, Arc::clone(&self.store), Arc::clone(&self.transport)));

        let flags = DriverFlags::default();
        if let Err(err) = worker.install(&flags).await {
            tracing::warn!(cache = worker.cache_name(), error = %err, "update failed; keeping current worker");
            return Err(err);
        }

        let has_active = self.slots.read().await.active.is_some();
        if has_active && !flags.skip_waiting_requested() {
            let mut slots = self.slots.write().await;
            if let Some(previous) = slots.waiting.replace(Arc::clone(&worker)) {
                previous.retire().await;
            }
            tracing::info!(worker = worker.id(), cache = worker.cache_name(), "waiting for clients to close");
            return Ok(worker);
        }

        self.promote(Arc::clone(&worker)).await?;
        Ok(worker)
    }

    /// First registration of a scope; identical to [`Registration::update`].
    pub async fn register(&self, config: WorkerConfig) -> Result<Arc<ServiceWorker>, Error> {
        self.update(config).await
    }

    /// Activate the waiting worker as if every page controlled by the
    /// current one had closed. Returns false if nothing was waiting.
    pub async fn release_clients(&self) -> Result<bool, Error> {
        let waiting = self.slots.write().await.waiting.take();
        match waiting {
            Some(worker) => {
                self.promote(worker).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Make `worker` the active worker.
    ///
    /// The outgoing worker's background writes are flushed before the new
    /// worker activates, so none of them land in a namespace activation has
    /// already deleted. The slot lock is held only for the swap.
    async fn promote(&self, worker: Arc<ServiceWorker>) -> Result<(), Error> {
        let current = self.slots.read().await.active.clone();
        if let Some(current) = &current {
            current.settle().await;
        }

        let flags = DriverFlags::default();
        worker.activate(&flags).await?;
        let cache_name = worker.cache_name().to_string();

        let replaced = {
            let mut slots = self.slots.write().await;
            let first = slots.active.is_none();
            let replaced = slots.active.replace(worker);
            // A first activation controls nothing until it claims.
            if flags.claim_requested() || !first {
                slots.controlled = true;
            }
            replaced
        };

        if let Some(previous) = replaced {
            // Writes from fetches that raced the swap may have recreated the
            // old namespace.
            previous.settle().await;
            if previous.cache_name() != cache_name
                && let Err(err) = self.store.delete(previous.cache_name()).await
            {
                tracing::warn!(cache = previous.cache_name(), error = %err, "failed to delete superseded cache");
            }
            previous.retire().await;
        }
        Ok(())
    }

    /// Answer a request the way the controlling worker (or the network) would.
    ///
    /// Never fails: transport errors on the uncontrolled path become a
    /// synthetic timeout response.
    pub async fn fetch(&self, request: Request) -> Resolved {
        let controller = {
            let slots = self.slots.read().await;
            if slots.controlled { slots.active.clone() } else { None }
        };

        let request = match controller {
            Some(worker) => match worker.fetch(request.clone()).await {
                Ok(FetchDisposition::Respond(resolved)) => return resolved,
                Ok(FetchDisposition::Passthrough(request)) => request,
                Err(err) => {
                    tracing::warn!(worker = worker.id(), error = %err, "controller rejected fetch; using network");
                    request
                }
            },
            None => request,
        };

        self.network(request).await
    }

    async fn network(&self, request: Request) -> Resolved {
        match self.transport.fetch(&request).await {
            Ok(response) => Resolved { response, source: ResponseSource::Network },
            Err(err) => {
                tracing::warn!(method = %request.method, url = %request.url, error = %err, "uncontrolled fetch failed");
                Resolved { response: Response::synthetic_timeout(), source: ResponseSource::Synthetic }
            }
        }
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.slots.read().await.active.clone()
    }

    pub async fn status(&self) -> RegistrationStatus {
        let (active, waiting, controlled) = {
            let slots = self.slots.read().await;
            (slots.active.clone(), slots.waiting.clone(), slots.controlled)
        };

        RegistrationStatus {
            active: match active {
                Some(worker) => Some(WorkerSummary::of(&worker).await),
                None => None,
            },
            waiting: match waiting {
                Some(worker) => Some(WorkerSummary::of(&worker).await),
                None => None,
            },
            controlled,
        }
    }

    /// Wait for background cache writes of the active and waiting workers.
    pub async fn settle(&self) {
        let workers: Vec<_> = {
            let slots = self.slots.read().await;
            slots.active.iter().chain(slots.waiting.iter()).cloned().collect()
        };
        for worker in workers {
            worker.settle().await;
        }
    }
}
