//! FieldSync - Offline-First Sync Engine
//!
//! FieldSync keeps a field technician working without connectivity. Edits
//! made offline are captured as queued mutations in a durable local store
//! and replayed against the backend, in order, once the device is back
//! online.
//!
//! # Module Structure
//!
//! - **`shared`** - Types used by every layer
//!   - Job snapshots, cached photos, queued mutations
//!   - Sync configuration and error types
//!
//! - **`local_db`** - Durable local store (SQLite via sqlx)
//!   - Jobs, sync queue, photos, attempt bookkeeping, dead letters
//!
//! - **`offline`** - Retry policy and the mutation dispatch table
//!
//! - **`remote`** - The backend seam (`RemoteService`) and its REST client
//!
//! - **`sync`** - The sync manager
//!   - Single-flight drains with progress broadcasting
//!   - Connectivity monitor and auto sync
//!   - Offline job provisioning
//!
//! - **`config`** - Environment-driven runtime configuration
//!
//! # Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::LocalDatabase;
//! use fieldsync::remote::RestClient;
//! use fieldsync::shared::{NewQueueItem, SyncConfig};
//! use fieldsync::sync::{spawn_auto_sync, ConnectivityMonitor, SyncManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = LocalDatabase::new().await?;
//! db.enqueue(NewQueueItem::update_job_status("J1", "completed")).await?;
//!
//! let remote = Arc::new(RestClient::new("http://127.0.0.1:54321", "anon-key")?);
//! let monitor = Arc::new(ConnectivityMonitor::new(false));
//! let manager = Arc::new(SyncManager::new(db, remote, monitor.clone(), SyncConfig::default()));
//! let _auto_sync = spawn_auto_sync(manager.clone());
//!
//! // Connectivity returns: exactly one drain runs
//! monitor.set_online(true);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `StoreError` for local store failures; opening a store that cannot be
//!   created fails with `StoreError::Init`
//! - `ApplyError` for a single queued mutation; never escapes a drain
//! - `SyncError` for drain-level failures, i.e. the queue could not be read
//!
//! # Thread Safety
//!
//! `SyncManager` is `Send + Sync` and meant to be shared behind an `Arc`.
//! The store is a pooled SQLite handle and may be cloned freely.

/// Shared types and data structures
pub mod shared;

/// Runtime configuration
pub mod config;

/// Durable local store
pub mod local_db;

/// Retry policy and reconciliation
pub mod offline;

/// Remote service layer
pub mod remote;

/// Sync manager
pub mod sync;
