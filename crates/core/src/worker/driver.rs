//! Primitives the engine asks of whoever delivers its lifecycle signals.

use std::sync::atomic::{AtomicBool, Ordering};

/// Requests a worker can make of its driver while handling a signal.
pub trait LifecycleDriver: Send + Sync {
    /// Activate this worker as soon as install succeeds, without waiting
    /// for pages controlled by an older worker to close.
    fn skip_waiting(&self);

    /// Route already-open clients through this worker from now on.
    fn claim_clients(&self);
}

/// Records which primitives were requested during one signal.
#[derive(Debug, Default)]
pub struct DriverFlags {
    skip_waiting: AtomicBool,
    claim_clients: AtomicBool,
}

impl DriverFlags {
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }

    pub fn claim_requested(&self) -> bool {
        self.claim_clients.load(Ordering::Acquire)
    }
}

impl LifecycleDriver for DriverFlags {
    fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::Release);
    }

    fn claim_clients(&self) {
        self.claim_clients.store(true, Ordering::Release);
    }
}
