//! # Local Database Module
//!
//! Durable, versioned local storage for offline-first field work. Survives
//! process restarts and holds three independent collections:
//!
//! - **Jobs**: latest known job snapshots
//! - **SyncQueue**: ordered list of pending mutations
//! - **Photos**: cached image blobs awaiting upload
//!
//! plus bookkeeping tables for retry attempts and dead letters.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool and schema management
//! - `schema.rs`: schema version constants and DDL
//! - `jobs.rs`: job snapshot CRUD
//! - `queue.rs`: pending-mutation queue and attempt bookkeeping
//! - `photos.rs`: photo cache CRUD
//! - `dead_letters.rs`: items moved out of the queue
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::LocalDatabase;
//! use fieldsync::shared::NewQueueItem;
//!
//! # async fn example() -> Result<(), fieldsync::shared::StoreError> {
//! let db = LocalDatabase::open("/tmp/fieldsync.db").await?;
//!
//! // Capture an offline edit
//! db.enqueue(NewQueueItem::update_job_status("J1", "completed")).await?;
//!
//! // Everything still pending, in insertion order
//! let pending = db.get_all_queue_items().await?;
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod jobs;
pub mod queue;
pub mod photos;
pub mod dead_letters;

use crate::shared::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Local database connection manager
///
/// Cloning is cheap and shares the underlying pool.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the local database at the platform default location
    pub async fn new() -> Result<Self> {
        Self::open(Self::default_path()).await
    }

    /// Open or create the local database at `path`
    ///
    /// Creates the file and the schema if they do not exist yet. Any failure
    /// along the way is reported as [`StoreError::Init`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::init(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::init(format!("cannot open {}: {}", path.display(), e)))?;

        tracing::debug!("[LocalDb] Opened {}", path.display());
        Self::with_pool(pool).await
    }

    /// Open a private in-memory database
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every SQLite in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::init(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::init(format!("cannot open in-memory store: {}", e)))?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let db = Self { pool };
        db.init_schema().await.map_err(|e| match e {
            StoreError::Init { .. } => e,
            other => StoreError::init(format!("schema initialization failed: {}", other)),
        })?;
        Ok(db)
    }

    /// Get database file path
    ///
    /// Returns the platform-specific path for the local database file.
    /// Uses the system's data directory when available.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("fieldsync");
        path.push("local.db");
        path
    }

    /// Initialize database schema
    ///
    /// Rejects a file written by a newer build before touching its tables,
    /// then creates all necessary tables and runs any pending migrations.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version = self.schema_version().await?;

        if schema::is_from_future(current_version) {
            return Err(StoreError::init(format!(
                "schema version {} is newer than supported version {}",
                current_version,
                schema::CURRENT_SCHEMA_VERSION
            )));
        }

        sqlx::raw_sql(schema::SCHEMA_SQL).execute(&self.pool).await?;
        self.run_migrations(current_version).await
    }

    /// Run database migrations
    ///
    /// Applies every migration newer than `current_version`.
    async fn run_migrations(&self, current_version: i32) -> Result<()> {
        for version in schema::get_pending_migrations(current_version) {
            self.apply_migration(version).await?;
        }

        Ok(())
    }

    /// Current schema version recorded in the file
    pub async fn schema_version(&self) -> Result<i32> {
        let (version,): (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Record a migration as applied
    ///
    /// Version 1 is the baseline created by `schema.sql`.
    async fn apply_migration(&self, version: i32) -> Result<()> {
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        tracing::info!("[LocalDb] Applied schema migration {}", version);
        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool; later operations fail
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        let (jobs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        let (pending_mutations,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;
        let (photos,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM photos")
            .fetch_one(&self.pool)
            .await?;
        let (dead_letters,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            jobs: jobs as u64,
            pending_mutations: pending_mutations as u64,
            photos: photos as u64,
            dead_letters: dead_letters as u64,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Cached job snapshots
    pub jobs: u64,
    /// Items in the sync queue
    pub pending_mutations: u64,
    /// Cached photos
    pub photos: u64,
    /// Dead-lettered mutations
    pub dead_letters: u64,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
