//! # Mutation Reconciliation
//!
//! Applies one queued mutation against the remote service. This is the
//! dispatch table of the sync core:
//!
//! | kind | remote call |
//! |---|---|
//! | `UPDATE_JOB_STATUS` | update job `jobId` with `{status}` |
//! | `ADD_NOTE` | read job `jobId`, then update it with the note appended |
//! | `CREATE_WORK_REPORT` | create work report from `data` verbatim |
//! | `UPDATE_WORK_REPORT` | update work report `reportId` with `data` verbatim |
//! | `UPLOAD_PHOTO` | decode `data.photoData`, upload the bytes |
//!
//! Local edits are applied as blind overwrites and appends. Nothing checks
//! whether the server copy changed while the device was offline.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::LocalDatabase;
//! use fieldsync::offline::Reconciler;
//! use fieldsync::remote::RestClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = LocalDatabase::in_memory().await?;
//! let remote = Arc::new(RestClient::new("http://127.0.0.1:54321", "anon-key")?);
//! let reconciler = Reconciler::new(remote, db.clone(), "job-photos");
//!
//! for item in db.get_all_queue_items().await? {
//!     reconciler.apply(&item).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::local_db::LocalDatabase;
use crate::remote::{PhotoUpload, RemoteService};
use crate::shared::error::ApplyError;
use crate::shared::job::append_note;
use crate::shared::mutation::{MutationKind, NotePayload, PhotoPayload, QueueItem, StatusPayload};
use crate::shared::photo::DecodedImage;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

/// Object folder for photos without a job
const UNASSIGNED_FOLDER: &str = "unassigned";

/// Applies queued mutations against a remote service
pub struct Reconciler<R: ?Sized> {
    remote: Arc<R>,
    db: LocalDatabase,
    photo_bucket: String,
}

impl<R: RemoteService + ?Sized> Reconciler<R> {
    /// Create a reconciler uploading photos to `photo_bucket`
    pub fn new(remote: Arc<R>, db: LocalDatabase, photo_bucket: impl Into<String>) -> Self {
        Self {
            remote,
            db,
            photo_bucket: photo_bucket.into(),
        }
    }

    /// Remote service this reconciler talks to
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Apply one queued mutation
    ///
    /// Does not touch the queue; removing the item on success is the
    /// caller's job.
    pub async fn apply(&self, item: &QueueItem) -> Result<(), ApplyError> {
        match &item.kind {
            MutationKind::UpdateJobStatus => {
                let job_id = require(item.job_id.as_deref(), "UPDATE_JOB_STATUS", "jobId")?;
                let payload: StatusPayload = payload(item, "UPDATE_JOB_STATUS")?;
                self.remote
                    .update_job(job_id, json!({ "status": payload.status }))
                    .await?;
            }
            MutationKind::AddNote => {
                let job_id = require(item.job_id.as_deref(), "ADD_NOTE", "jobId")?;
                let payload: NotePayload = payload(item, "ADD_NOTE")?;
                let job = self.remote.fetch_job(job_id).await?;
                let notes = append_note(job.notes(), &payload.note);
                self.remote.update_job(job_id, json!({ "notes": notes })).await?;
            }
            MutationKind::CreateWorkReport => {
                self.remote.create_work_report(item.data.clone()).await?;
            }
            MutationKind::UpdateWorkReport => {
                let report_id = require(item.report_id.as_deref(), "UPDATE_WORK_REPORT", "reportId")?;
                self.remote
                    .update_work_report(report_id, item.data.clone())
                    .await?;
            }
            MutationKind::UploadPhoto => {
                let payload: PhotoPayload = payload(item, "UPLOAD_PHOTO")?;
                self.upload_photo(item, payload).await?;
            }
            MutationKind::Unknown(kind) => {
                return Err(ApplyError::UnknownKind { kind: kind.clone() });
            }
        }

        Ok(())
    }

    async fn upload_photo(&self, item: &QueueItem, payload: PhotoPayload) -> Result<(), ApplyError> {
        let image = DecodedImage::parse(&payload.photo_data)?;

        let folder = payload
            .job_id
            .as_deref()
            .or(item.job_id.as_deref())
            .unwrap_or(UNASSIGNED_FOLDER);
        let file_name = match payload.file_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}.{}", uuid::Uuid::new_v4(), image.extension()),
        };

        let path = self
            .remote
            .upload_photo(PhotoUpload {
                bucket: Some(self.photo_bucket.clone()),
                path: format!("{}/{}", folder, file_name),
                content_type: image.content_type,
                bytes: image.bytes,
            })
            .await?;

        tracing::debug!("[Sync] Uploaded photo for item {} to {}", item.id, path);

        // The upload already happened; a stale cache entry must not make the item retry.
        if let Some(photo_id) = payload.photo_id.as_deref() {
            if let Err(e) = self.db.delete_photo(photo_id).await {
                tracing::warn!("[Sync] Uploaded photo {} but could not drop cached copy: {}", photo_id, e);
            }
        }

        Ok(())
    }
}

fn require<'a>(
    value: Option<&'a str>,
    kind: &'static str,
    field: &'static str,
) -> Result<&'a str, ApplyError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ApplyError::missing_target(kind, field)),
    }
}

fn payload<T: DeserializeOwned>(item: &QueueItem, kind: &'static str) -> Result<T, ApplyError> {
    T::deserialize(&item.data).map_err(|e| ApplyError::invalid_payload(kind, e.to_string()))
}
