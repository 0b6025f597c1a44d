//! # Offline Sync Support
//!
//! Pieces of the offline-first workflow that do not own any state:
//!
//! - `retry.rs`: retry and backoff policy for failed queue items
//! - `reconciliation.rs`: applies one queued mutation against the remote service
//!
//! The sync manager in [`crate::sync`] drives both.

pub mod retry;
pub mod reconciliation;

// Re-export main types
pub use retry::{RetryDecision, RetryPolicy};
pub use reconciliation::Reconciler;
