//! # Offline Job Provisioning
//!
//! Caches a technician's open jobs on the device before they head out.
//! Snapshots replace whatever was cached for the same id; nothing is merged.

use super::SyncManager;
use crate::local_db::LocalDatabase;
use crate::remote::RemoteService;
use crate::shared::error::SyncError;

/// Fetch the technician's jobs with one of `statuses` and cache them
///
/// Returns the number of jobs cached. Failures are returned as-is; nothing
/// is retried.
pub async fn download_jobs_for_offline<R>(
    remote: &R,
    db: &LocalDatabase,
    technician_id: &str,
    statuses: &[String],
) -> Result<usize, SyncError>
where
    R: RemoteService + ?Sized,
{
    let jobs = remote.list_jobs(technician_id, statuses).await?;
    db.put_jobs(&jobs).await?;

    tracing::info!(
        "[Sync] Cached {} jobs for technician {} for offline use",
        jobs.len(),
        technician_id
    );
    Ok(jobs.len())
}

impl<R: RemoteService + ?Sized> SyncManager<R> {
    /// Cache the technician's open jobs using the configured statuses
    pub async fn download_jobs_for_offline(&self, technician_id: &str) -> Result<usize, SyncError> {
        download_jobs_for_offline(
            self.remote().as_ref(),
            self.db(),
            technician_id,
            &self.config().open_job_statuses,
        )
        .await
    }
}
