//! Queued Mutations
//!
//! Types for the pending-mutation queue: the closed set of mutation kinds,
//! the durable `QueueItem`, typed payloads, per-item attempt bookkeeping
//! and dead letters.
//!
//! # Lifecycle
//!
//! A `QueueItem` is created when an edit is made without a confirmed remote
//! write, and deleted the moment its remote call succeeds. It is never
//! updated in place: failure bookkeeping lives in `AttemptState`.
//!
//! # Usage
//!
//! ```rust
//! use fieldsync::shared::mutation::{MutationKind, NewQueueItem};
//!
//! let item = NewQueueItem::update_job_status("J1", "completed");
//! assert_eq!(item.kind, MutationKind::UpdateJobStatus);
//! assert_eq!(item.kind.as_str(), "UPDATE_JOB_STATUS");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Mutation kinds understood by the reconciler
///
/// Tags read back from the store that match none of the known kinds are
/// preserved verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MutationKind {
    /// Set a job's status
    UpdateJobStatus,
    /// Append a line to a job's notes
    AddNote,
    /// Create a work report
    CreateWorkReport,
    /// Update an existing work report
    UpdateWorkReport,
    /// Upload an embedded photo
    UploadPhoto,
    /// Tag without a handler
    Unknown(String),
}

impl MutationKind {
    /// Stored type tag
    pub fn as_str(&self) -> &str {
        match self {
            Self::UpdateJobStatus => "UPDATE_JOB_STATUS",
            Self::AddNote => "ADD_NOTE",
            Self::CreateWorkReport => "CREATE_WORK_REPORT",
            Self::UpdateWorkReport => "UPDATE_WORK_REPORT",
            Self::UploadPhoto => "UPLOAD_PHOTO",
            Self::Unknown(tag) => tag,
        }
    }

    /// Parse a stored type tag
    pub fn parse(tag: &str) -> Self {
        match tag {
            "UPDATE_JOB_STATUS" => Self::UpdateJobStatus,
            "ADD_NOTE" => Self::AddNote,
            "CREATE_WORK_REPORT" => Self::CreateWorkReport,
            "UPDATE_WORK_REPORT" => Self::UpdateWorkReport,
            "UPLOAD_PHOTO" => Self::UploadPhoto,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether the dispatch table has a handler for this kind
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for MutationKind {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<MutationKind> for String {
    fn from(kind: MutationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending mutation as stored in the sync queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Auto-numbered, monotonically increasing; defines processing order
    pub id: i64,
    /// Mutation kind
    #[serde(rename = "type")]
    pub kind: MutationKind,
    /// Target job, for job mutations
    pub job_id: Option<String>,
    /// Target work report, for report updates
    pub report_id: Option<String>,
    /// Kind-dependent payload
    pub data: Value,
    /// Creation time (epoch millis); diagnostics only
    pub timestamp: i64,
    /// Always `false`: completion is represented by deletion
    pub synced: bool,
}

/// A mutation about to be enqueued
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueItem {
    /// Mutation kind
    pub kind: MutationKind,
    /// Target job
    pub job_id: Option<String>,
    /// Target work report
    pub report_id: Option<String>,
    /// Payload
    pub data: Value,
}

impl NewQueueItem {
    /// Raw constructor; prefer the typed helpers below
    pub fn new(kind: MutationKind, data: Value) -> Self {
        Self {
            kind,
            job_id: None,
            report_id: None,
            data,
        }
    }

    /// Attach a target job
    pub fn for_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Attach a target report
    pub fn for_report(mut self, report_id: impl Into<String>) -> Self {
        self.report_id = Some(report_id.into());
        self
    }

    /// `UPDATE_JOB_STATUS`
    pub fn update_job_status(job_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::new(
            MutationKind::UpdateJobStatus,
            json!({ "status": status.into() }),
        )
        .for_job(job_id)
    }

    /// `ADD_NOTE`
    pub fn add_note(job_id: impl Into<String>, note: impl Into<String>) -> Self {
        Self::new(MutationKind::AddNote, json!({ "note": note.into() })).for_job(job_id)
    }

    /// `CREATE_WORK_REPORT`
    pub fn create_work_report(report: Value) -> Self {
        Self::new(MutationKind::CreateWorkReport, report)
    }

    /// `UPDATE_WORK_REPORT`
    pub fn update_work_report(report_id: impl Into<String>, report: Value) -> Self {
        Self::new(MutationKind::UpdateWorkReport, report).for_report(report_id)
    }

    /// `UPLOAD_PHOTO`
    pub fn upload_photo(payload: PhotoPayload) -> Self {
        let job_id = payload.job_id.clone();
        let data = serde_json::to_value(&payload).unwrap_or(Value::Null);
        let item = Self::new(MutationKind::UploadPhoto, data);
        match job_id {
            Some(job_id) => item.for_job(job_id),
            None => item,
        }
    }
}

/// `UPDATE_JOB_STATUS` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// New status
    pub status: String,
}

/// `ADD_NOTE` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    /// Line to append
    pub note: String,
}

/// `UPLOAD_PHOTO` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPayload {
    /// Data URL or bare base64
    pub photo_data: String,
    /// Owning job, used for the upload path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Cached photo to drop once uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
    /// Preferred object name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Failure bookkeeping for a retained queue item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    /// Queue item this state belongs to
    pub item_id: i64,
    /// Failed remote attempts
    pub attempts: u32,
    /// Drains that found no handler for the item's kind
    pub unknown_kind_hits: u32,
    /// Last failure (epoch millis)
    pub last_attempt: Option<i64>,
    /// Earliest next attempt (epoch millis)
    pub next_attempt_at: Option<i64>,
    /// Last error message
    pub last_error: Option<String>,
}

/// Why an item left the queue without being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadLetterReason {
    /// No handler for the mutation kind
    UnknownKind,
    /// Retry policy gave up
    RetriesExhausted,
}

impl DeadLetterReason {
    /// Stored tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownKind => "unknown_kind",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }

    /// Parse a stored tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "unknown_kind" => Some(Self::UnknownKind),
            "retries_exhausted" => Some(Self::RetriesExhausted),
            _ => None,
        }
    }
}

/// Mutation moved out of the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// Dead-letter id
    pub id: i64,
    /// The queue item as it was when it was moved
    pub item: QueueItem,
    /// Failed attempts at the time of the move
    pub attempts: u32,
    /// Why it was moved
    pub reason: DeadLetterReason,
    /// Last error, if any
    pub last_error: Option<String>,
    /// When it was moved (epoch millis)
    pub failed_at: i64,
}
