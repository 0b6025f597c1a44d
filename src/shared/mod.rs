//! Shared Module
//!
//! Types used by every layer of the sync core: the cached job and photo
//! shapes, queued mutations, configuration and errors.
//!
//! # Overview
//!
//! Nothing in here performs I/O. The local store persists these types, the
//! remote layer sends them, and the sync manager moves them between the two.

/// Cached job snapshot
pub mod job;

/// Cached photos and embedded image payloads
pub mod photo;

/// Queued mutations and dead letters
pub mod mutation;

/// Shared error types
pub mod error;

/// Sync configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use job::Job;
pub use photo::Photo;
pub use mutation::{MutationKind, NewQueueItem, QueueItem, DeadLetter, DeadLetterReason};
pub use error::{ApplyError, PhotoError, RemoteError, StoreError, SyncError};
pub use config::{SyncConfig, SyncConfigBuilder, ConfigError};
