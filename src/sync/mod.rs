//! # Sync Manager
//!
//! Drains the pending-mutation queue against the remote service.
//!
//! ## Architecture
//!
//! The sync manager coordinates:
//! - **Local Store**: source of the batch and of attempt bookkeeping
//! - **Reconciler**: applies one queued mutation remotely
//! - **Network Monitor**: connectivity state and transition events
//! - **Sync State**: status broadcasting to any number of subscribers
//! - **Metrics**: per-instance counters
//!
//! ## Drain Guarantees
//!
//! - **Single-flight**: at most one drain runs per manager; a second call
//!   while one is running returns `Skipped(AlreadyRunning)` immediately.
//! - **Frozen batch**: the queue is read once at the start; items enqueued
//!   during the drain wait for the next one.
//! - **FIFO**: items are applied in insertion order.
//! - **Delete on success**: an item is deleted right after its remote call
//!   succeeds, before the next item starts.
//! - **Failure isolation**: a failed item stays queued and the walk goes on.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::LocalDatabase;
//! use fieldsync::remote::RestClient;
//! use fieldsync::shared::SyncConfig;
//! use fieldsync::sync::{ConnectivityMonitor, SyncManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = LocalDatabase::new().await?;
//! let remote = Arc::new(RestClient::new("http://127.0.0.1:54321", "anon-key")?);
//! let monitor = Arc::new(ConnectivityMonitor::new(true));
//! let manager = SyncManager::new(db, remote, monitor, SyncConfig::default());
//!
//! let _subscription = manager.subscribe(|status| {
//!     println!("syncing={} progress={}%", status.syncing, status.progress);
//! });
//!
//! let outcome = manager.drain().await?;
//! if let Some(report) = outcome.report() {
//!     println!("{}", report.user_message());
//! }
//! # Ok(())
//! # }
//! ```

pub mod network_monitor;
pub mod sync_state;
pub mod metrics;
pub mod provisioning;

pub use metrics::SyncMetrics;
pub use network_monitor::{spawn_auto_sync, spawn_probe, ConnectivityEvent, ConnectivityMonitor};
pub use sync_state::{StatusBroadcaster, Subscription, SyncStatus};

use crate::local_db::LocalDatabase;
use crate::offline::reconciliation::Reconciler;
use crate::offline::retry::RetryDecision;
use crate::remote::RemoteService;
use crate::shared::error::{ApplyError, SyncError, SYNC_FAILED_MESSAGE};
use crate::shared::mutation::{AttemptState, DeadLetterReason, QueueItem};
use crate::shared::SyncConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::Instrument;

/// Why a drain did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another drain on the same manager is in progress
    AlreadyRunning,
    /// The connectivity monitor reports offline
    Offline,
}

/// Counts for one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items in the batch
    pub total: usize,
    /// Items applied remotely and deleted
    pub synced: usize,
    /// Items whose remote call failed
    pub failed: usize,
    /// Items with no handler for their kind
    pub unknown: usize,
    /// Items left out of the batch because their backoff has not elapsed
    pub deferred: usize,
    /// Items moved to dead letters during this drain
    pub dead_lettered: usize,
}

impl DrainReport {
    /// Message surfaced to the user
    pub fn user_message(&self) -> String {
        format!("Synced {} pending changes", self.synced)
    }

    /// Whether every item in the batch was applied
    pub fn is_clean(&self) -> bool {
        self.synced == self.total
    }
}

/// Result of a `drain()` call that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The call was a no-op
    Skipped(SkipReason),
    /// The batch was walked
    Completed(DrainReport),
}

impl DrainOutcome {
    /// Report of a completed drain
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Clears the draining flag when the drain ends, however it ends
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Queue reconciler with single-flight drains
pub struct SyncManager<R: ?Sized> {
    db: LocalDatabase,
    reconciler: Reconciler<R>,
    monitor: Arc<ConnectivityMonitor>,
    broadcaster: StatusBroadcaster,
    config: SyncConfig,
    draining: AtomicBool,
    metrics: Mutex<SyncMetrics>,
}

impl<R: RemoteService + ?Sized> SyncManager<R> {
    pub fn new(
        db: LocalDatabase,
        remote: Arc<R>,
        monitor: Arc<ConnectivityMonitor>,
        config: SyncConfig,
    ) -> Self {
        let reconciler = Reconciler::new(remote, db.clone(), config.photo_bucket.clone());
        Self {
            db,
            reconciler,
            monitor,
            broadcaster: StatusBroadcaster::new(),
            config,
            draining: AtomicBool::new(false),
            metrics: Mutex::new(SyncMetrics::new()),
        }
    }

    /// Local store this manager drains
    pub fn db(&self) -> &LocalDatabase {
        &self.db
    }

    /// Remote service items are applied against
    pub fn remote(&self) -> &Arc<R> {
        self.reconciler.remote()
    }

    /// Connectivity monitor gating drains
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Status broadcaster for this manager
    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Register a status callback
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.broadcaster.subscribe(callback)
    }

    /// Most recently broadcast status
    pub fn status(&self) -> SyncStatus {
        self.broadcaster.last()
    }

    /// Whether a drain is running
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Snapshot of the counters
    pub fn metrics(&self) -> SyncMetrics {
        self.lock_metrics().clone()
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, SyncMetrics> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drain the queue once
    ///
    /// Returns `Skipped` without touching the queue if a drain is already
    /// running or the device is offline. Per-item failures are reported in
    /// the `DrainReport`; only a failure to read the batch is an error.
    pub async fn drain(&self) -> Result<DrainOutcome, SyncError> {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("[Sync] Drain already in progress; ignoring request");
            self.lock_metrics().record_skip();
            return Ok(DrainOutcome::Skipped(SkipReason::AlreadyRunning));
        };

        if !self.monitor.is_online() {
            tracing::debug!("[Sync] Offline; not draining");
            self.lock_metrics().record_skip();
            return Ok(DrainOutcome::Skipped(SkipReason::Offline));
        }

        let started = Instant::now();
        let result = self.walk_queue().instrument(tracing::info_span!("drain")).await;

        let elapsed = started.elapsed();
        match &result {
            Ok(report) => self.lock_metrics().record_completion(report, elapsed),
            Err(_) => self.lock_metrics().record_failure(elapsed),
        }

        result.map(DrainOutcome::Completed)
    }

    async fn walk_queue(&self) -> Result<DrainReport, SyncError> {
        self.broadcaster.broadcast(SyncStatus::progress(0));

        let (batch, states, mut report) = match self.read_batch().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!("[Sync] Could not read sync queue: {}", e);
                self.broadcaster.broadcast(SyncStatus::failed(SYNC_FAILED_MESSAGE));
                return Err(e);
            }
        };

        if batch.is_empty() {
            tracing::debug!("[Sync] Nothing to sync ({} deferred)", report.deferred);
            self.broadcaster.broadcast(SyncStatus::idle());
            return Ok(report);
        }

        report.total = batch.len();
        tracing::info!("[Sync] Draining {} queued changes", report.total);

        for item in &batch {
            let span = tracing::debug_span!("item", id = item.id, kind = %item.kind);
            self.process_item(item, states.get(&item.id), &mut report)
                .instrument(span)
                .await;

            self.broadcaster
                .broadcast(SyncStatus::progress(progress(report.synced, report.total)));
        }

        self.broadcaster.broadcast(SyncStatus::finished());
        tracing::info!(
            "[Sync] Drain finished: {} synced, {} failed, {} unknown, {} dead-lettered",
            report.synced,
            report.failed,
            report.unknown,
            report.dead_lettered
        );

        Ok(report)
    }

    /// Snapshot the queue and split off items that must not run now
    async fn read_batch(
        &self,
    ) -> Result<(Vec<QueueItem>, HashMap<i64, AttemptState>, DrainReport), SyncError> {
        let items = self.db.get_all_queue_items().await.map_err(SyncError::BatchRead)?;
        let states = self.db.get_attempt_states().await.map_err(SyncError::BatchRead)?;

        let now = chrono::Utc::now().timestamp_millis();
        let policy = &self.config.retry_policy;
        let mut report = DrainReport::default();
        let mut batch = Vec::with_capacity(items.len());

        for item in items {
            let state = states.get(&item.id);
            match policy.decide(state, now) {
                RetryDecision::Eligible => batch.push(item),
                RetryDecision::Deferred { until } => {
                    tracing::debug!("[Sync] Item {} deferred until {}", item.id, until);
                    report.deferred += 1;
                }
                RetryDecision::Exhausted => {
                    let attempts = state.map(|s| s.attempts).unwrap_or_default();
                    let last_error = state.and_then(|s| s.last_error.as_deref());
                    match self
                        .db
                        .dead_letter(&item, DeadLetterReason::RetriesExhausted, attempts, last_error)
                        .await
                    {
                        Ok(_) => report.dead_lettered += 1,
                        Err(e) => tracing::warn!("[Sync] Could not dead-letter item {}: {}", item.id, e),
                    }
                }
            }
        }

        Ok((batch, states, report))
    }

    async fn process_item(
        &self,
        item: &QueueItem,
        state: Option<&AttemptState>,
        report: &mut DrainReport,
    ) {
        match self.reconciler.apply(item).await {
            Ok(()) => {
                report.synced += 1;
                if let Err(e) = self.db.delete_queue_item(item.id).await {
                    tracing::error!(
                        "[Sync] Item {} was applied but could not be removed from the queue: {}",
                        item.id,
                        e
                    );
                }
            }
            Err(ApplyError::UnknownKind { kind }) => {
                report.unknown += 1;
                tracing::warn!("[Sync] Unknown mutation type '{}' for item {}; keeping it queued", kind, item.id);
                self.note_unknown_kind(item, state, report).await;
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!("[Sync] Failed to apply item {} ({}): {}", item.id, item.kind, e);
                self.note_failure(item, state, &e.to_string(), report).await;
            }
        }
    }

    async fn note_unknown_kind(
        &self,
        item: &QueueItem,
        state: Option<&AttemptState>,
        report: &mut DrainReport,
    ) {
        let hits = match self.db.record_unknown_kind(item.id).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("[Sync] Could not record unknown kind for item {}: {}", item.id, e);
                return;
            }
        };

        if hits < self.config.dead_letter_after {
            return;
        }

        let attempts = state.map(|s| s.attempts).unwrap_or_default();
        let message = format!("no handler for '{}' after {} drains", item.kind, hits);
        match self
            .db
            .dead_letter(item, DeadLetterReason::UnknownKind, attempts, Some(&message))
            .await
        {
            Ok(_) => report.dead_lettered += 1,
            Err(e) => tracing::warn!("[Sync] Could not dead-letter item {}: {}", item.id, e),
        }
    }

    async fn note_failure(
        &self,
        item: &QueueItem,
        state: Option<&AttemptState>,
        error: &str,
        report: &mut DrainReport,
    ) {
        let policy = &self.config.retry_policy;
        let attempts = state.map(|s| s.attempts).unwrap_or_default() + 1;

        if policy.is_exhausted(attempts) {
            match self
                .db
                .dead_letter(item, DeadLetterReason::RetriesExhausted, attempts, Some(error))
                .await
            {
                Ok(_) => report.dead_lettered += 1,
                Err(e) => tracing::warn!("[Sync] Could not dead-letter item {}: {}", item.id, e),
            }
            return;
        }

        let now = chrono::Utc::now().timestamp_millis();
        let next_attempt_at = Some(policy.next_attempt_at(attempts, now)).filter(|at| *at > now);
        if let Err(e) = self.db.record_failure(item.id, error, next_attempt_at).await {
            tracing::warn!("[Sync] Could not record failure for item {}: {}", item.id, e);
        }
    }
}

/// `round(synced / total * 100)`
fn progress(synced: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((synced as f64 / total as f64) * 100.0).round() as u8
}
