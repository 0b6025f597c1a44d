//! Shared Error Types
//!
//! This module defines the error taxonomy used across the local store, the
//! remote service layer and the sync manager.
//!
//! # Error Categories
//!
//! - `StoreError` - Local durable store failures (open, read, write)
//! - `RemoteError` - External service failures (network, HTTP status, decoding)
//! - `PhotoError` - Embedded image payloads that cannot be decoded
//! - `ApplyError` - Failure to apply a single queued mutation
//! - `SyncError` - Drain-level failures that escape `SyncManager::drain`
//!
//! # Propagation
//!
//! `ApplyError` never leaves the drain loop: it is logged and the item stays
//! queued. Only a failure to read the batch surfaces as `SyncError::BatchRead`.
//!
//! # Usage
//!
//! ```rust
//! use fieldsync::shared::error::ApplyError;
//!
//! let error = ApplyError::missing_target("UPDATE_JOB_STATUS", "jobId");
//! assert!(error.to_string().contains("jobId"));
//! ```
use thiserror::Error;

/// User-facing message for a drain that could not run at all
pub const SYNC_FAILED_MESSAGE: &str = "Sync failed. Will retry later.";

/// Local durable store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened or its schema could not be created
    #[error("Failed to initialize local store: {message}")]
    Init {
        /// Human-readable error message
        message: String,
    },

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a new initialization error
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }
}

/// External service layer errors
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (connection refused, timeout, TLS)
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Request failed: {status} - {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// The target entity does not exist remotely
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity kind, e.g. `job`
        entity: &'static str,
        /// Entity identifier
        id: String,
    },

    /// The configured base URL cannot carry request paths
    #[error("Invalid base URL '{url}': {message}")]
    InvalidUrl {
        /// URL as configured
        url: String,
        /// Human-readable error message
        message: String,
    },

    /// The response body could not be interpreted
    #[error("Failed to parse response: {message}")]
    Decode {
        /// Human-readable error message
        message: String,
    },
}

impl RemoteError {
    /// Create a new status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a new invalid URL error
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Embedded image payload errors
#[derive(Debug, Error)]
pub enum PhotoError {
    /// `data:` URL without the `,` between header and body
    #[error("data URL has no ',' separator")]
    MissingSeparator,

    /// `data:` URL whose body is not base64
    #[error("unsupported data URL encoding '{encoding}'")]
    UnsupportedEncoding {
        /// Header as found in the URL
        encoding: String,
    },

    /// No image bytes at all
    #[error("image payload is empty")]
    Empty,

    /// Body is not valid base64
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failure to apply one queued mutation
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The remote call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The item has no handler in the dispatch table
    #[error("Unknown mutation type '{kind}'")]
    UnknownKind {
        /// Raw type tag as stored in the queue
        kind: String,
    },

    /// The payload does not have the shape the mutation kind requires
    #[error("Invalid {kind} payload: {message}")]
    InvalidPayload {
        /// Mutation type tag
        kind: &'static str,
        /// Human-readable error message
        message: String,
    },

    /// The foreign reference required by the mutation kind is absent
    #[error("{kind} is missing its {field}")]
    MissingTarget {
        /// Mutation type tag
        kind: &'static str,
        /// Missing field name
        field: &'static str,
    },

    /// Embedded photo payload could not be decoded
    #[error("Photo decode error: {0}")]
    Photo(#[from] PhotoError),
}

impl ApplyError {
    /// Create a new invalid payload error
    pub fn invalid_payload(kind: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            kind,
            message: message.into(),
        }
    }

    /// Create a new missing target error
    pub fn missing_target(kind: &'static str, field: &'static str) -> Self {
        Self::MissingTarget { kind, field }
    }
}

/// Errors that escape a drain or a provisioning run
#[derive(Debug, Error)]
pub enum SyncError {
    /// The pending queue could not be enumerated; the whole drain aborted
    #[error("Failed to read sync queue: {0}")]
    BatchRead(#[source] StoreError),

    /// Any other local store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote failure outside the per-item loop (e.g. job download)
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Message surfaced to the user when a drain fails outright
    pub fn user_message(&self) -> &'static str {
        SYNC_FAILED_MESSAGE
    }
}
