//! # Network Monitor
//!
//! Turns a binary online/offline signal into transition events.
//!
//! ## Features
//!
//! - **Transition Detection**: an event goes out only when the state actually changes
//! - **Auto Sync**: `spawn_auto_sync` drains the queue once per "became online"
//! - **Reachability Probe**: `spawn_probe` feeds the monitor from `RemoteService::ping`

use crate::remote::RemoteService;
use crate::sync::SyncManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the transition channel
const EVENT_CAPACITY: usize = 16;

/// Connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The device became reachable
    WentOnline,
    /// The device lost connectivity
    WentOffline,
}

impl ConnectivityEvent {
    /// Message surfaced to the user
    pub fn message(&self) -> &'static str {
        match self {
            Self::WentOnline => "Back online. Syncing pending changes...",
            Self::WentOffline => "You are offline. Changes will sync when the connection returns.",
        }
    }
}

/// Current connectivity plus a channel of transitions
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    tx: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    /// Create a monitor with a known starting state
    pub fn new(online: bool) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online: AtomicBool::new(online),
            tx,
        }
    }

    /// Whether the device is currently considered online
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Feed the latest signal; returns the transition it caused, if any
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return None;
        }

        let event = if online {
            ConnectivityEvent::WentOnline
        } else {
            ConnectivityEvent::WentOffline
        };
        tracing::info!("[Network] {:?}", event);
        // No listeners is fine.
        let _ = self.tx.send(event);
        Some(event)
    }

    /// Receiver for transitions from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Drain once on every "became online" transition
///
/// Runs until the returned handle is aborted.
pub fn spawn_auto_sync<R>(manager: Arc<SyncManager<R>>) -> JoinHandle<()>
where
    R: RemoteService + ?Sized + 'static,
{
    let mut events = manager.monitor().subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConnectivityEvent::WentOnline) => {
                    tracing::info!("[Network] {}", ConnectivityEvent::WentOnline.message());
                    match manager.drain().await {
                        Ok(outcome) => tracing::debug!("[Sync] Auto sync finished: {:?}", outcome),
                        Err(e) => tracing::error!("[Sync] Auto sync failed: {}", e),
                    }
                }
                Ok(ConnectivityEvent::WentOffline) => {
                    tracing::info!("[Network] {}", ConnectivityEvent::WentOffline.message());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Network] Missed {} connectivity events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Poll `remote.ping()` every `interval` and report the result to `monitor`
///
/// Runs until the returned handle is aborted.
pub fn spawn_probe<R>(
    monitor: Arc<ConnectivityMonitor>,
    remote: Arc<R>,
    interval: Duration,
) -> JoinHandle<()>
where
    R: RemoteService + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reachable = match remote.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("[Network] Probe failed: {}", e);
                    false
                }
            };
            monitor.set_online(reachable);
        }
    })
}
