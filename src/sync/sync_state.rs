//! # Sync Status Broadcasting
//!
//! A typed observer registry for `{syncing, progress}` updates, so any number
//! of surfaces can follow a drain without polling.
//!
//! ## Delivery
//!
//! - Callbacks run synchronously, in subscription order, on the task that
//!   broadcasts.
//! - A panicking callback is logged and skipped; later callbacks still run.
//! - Every status is also published on a `tokio::sync::broadcast` channel for
//!   async consumers.
//!
//! ## Usage
//!
//! ```rust
//! use fieldsync::sync::{StatusBroadcaster, SyncStatus};
//!
//! let broadcaster = StatusBroadcaster::new();
//! let subscription = broadcaster.subscribe(|status| {
//!     println!("syncing={} progress={}", status.syncing, status.progress);
//! });
//!
//! broadcaster.broadcast(SyncStatus::progress(50));
//! subscription.unsubscribe();
//! subscription.unsubscribe();
//! ```

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;

/// Capacity of the async status channel
const CHANNEL_CAPACITY: usize = 64;

/// Status event delivered to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// A drain is running
    pub syncing: bool,
    /// Share of the batch applied successfully, 0..=100
    pub progress: u8,
    /// Set when the drain aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncStatus {
    /// No drain running
    pub fn idle() -> Self {
        Self::default()
    }

    /// Drain running at `progress` percent
    pub fn progress(progress: u8) -> Self {
        Self {
            syncing: true,
            progress: progress.min(100),
            error: None,
        }
    }

    /// Drain walked its whole batch
    pub fn finished() -> Self {
        Self {
            syncing: false,
            progress: 100,
            error: None,
        }
    }

    /// Drain aborted before walking its batch
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            syncing: false,
            progress: 0,
            error: Some(message.into()),
        }
    }
}

type Callback = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Callback)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Observer registry for sync status
pub struct StatusBroadcaster {
    registry: Arc<Mutex<Registry>>,
    last: Mutex<SyncStatus>,
    tx: broadcast::Sender<SyncStatus>,
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .field("last", &self.last())
            .finish()
    }
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            last: Mutex::new(SyncStatus::idle()),
            tx,
        }
    }

    /// Register a callback; it receives every status broadcast from now on
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Async receiver for every status broadcast from now on
    pub fn receiver(&self) -> broadcast::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    /// Deliver a status to every subscriber
    pub fn broadcast(&self, status: SyncStatus) {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<Callback> = lock(&self.registry)
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&status))).is_err() {
                tracing::warn!("[Sync] Status subscriber panicked; continuing delivery");
            }
        }

        *self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = status.clone();
        // No async receivers is fine.
        let _ = self.tx.send(status);
    }

    /// Most recent status
    pub fn last(&self) -> SyncStatus {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }
}

/// Handle returned by [`StatusBroadcaster::subscribe`]
///
/// Dropping it keeps the callback registered; call
/// [`unsubscribe`](Self::unsubscribe) to stop delivery.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Stop delivery to this callback; calling it again is a no-op
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
