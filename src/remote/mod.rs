//! Remote Service Layer
//!
//! The seam between the sync core and the backend. The reconciler and the
//! job provisioning workflow only ever talk to a [`RemoteService`]; the
//! production implementation is [`http::RestClient`], tests substitute a
//! recording mock.

pub mod http;

use crate::shared::error::RemoteError;
use crate::shared::Job;
use async_trait::async_trait;
use serde_json::Value;

pub use http::RestClient;

/// Binary object to store remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    /// Storage bucket; the service default when `None`
    pub bucket: Option<String>,
    /// Object path inside the bucket, e.g. `J1/3f2c.jpg`
    pub path: String,
    /// MIME type
    pub content_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

/// Operations the sync core needs from the backend
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Read the current server copy of a job
    async fn fetch_job(&self, job_id: &str) -> Result<Job, RemoteError>;

    /// Apply a partial update to a job
    async fn update_job(&self, job_id: &str, patch: Value) -> Result<(), RemoteError>;

    /// Create a work report from a verbatim payload
    async fn create_work_report(&self, report: Value) -> Result<(), RemoteError>;

    /// Update an existing work report with a verbatim payload
    async fn update_work_report(&self, report_id: &str, report: Value) -> Result<(), RemoteError>;

    /// Store a file, returning its remote path
    async fn upload_photo(&self, upload: PhotoUpload) -> Result<String, RemoteError>;

    /// Jobs assigned to a technician whose status is one of `statuses`
    async fn list_jobs(&self, technician_id: &str, statuses: &[String]) -> Result<Vec<Job>, RemoteError>;

    /// Cheap reachability check used by the connectivity probe
    async fn ping(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}
