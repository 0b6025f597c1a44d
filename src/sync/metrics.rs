//! # Sync Metrics
//!
//! Counters for one sync manager instance.

use super::DrainReport;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMetrics {
    pub drains_completed: u64,
    pub drains_failed: u64,
    pub drains_skipped: u64,
    pub items_synced: u64,
    pub items_failed: u64,
    pub items_dead_lettered: u64,
    pub last_drain_duration: Option<Duration>,
    pub last_drain_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_completion(&mut self, report: &DrainReport, duration: Duration) {
        self.drains_completed += 1;
        self.items_synced += report.synced as u64;
        self.items_failed += (report.failed + report.unknown) as u64;
        self.items_dead_lettered += report.dead_lettered as u64;
        self.last_drain_duration = Some(duration);
        self.last_drain_at = Some(chrono::Utc::now());
    }

    pub fn record_failure(&mut self, duration: Duration) {
        self.drains_failed += 1;
        self.last_drain_duration = Some(duration);
        self.last_drain_at = Some(chrono::Utc::now());
    }

    pub fn record_skip(&mut self) {
        self.drains_skipped += 1;
    }

    /// Share of drains that walked their batch
    pub fn success_rate(&self) -> f64 {
        let total = self.drains_completed + self.drains_failed;
        if total == 0 {
            0.0
        } else {
            self.drains_completed as f64 / total as f64
        }
    }
}
