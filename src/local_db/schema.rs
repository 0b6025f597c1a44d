//! Database Schema Definitions
//!
//! Contains schema-related constants and utilities.

/// DDL for every collection; idempotent
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Schema migration versions
pub const MIGRATION_VERSIONS: &[i32] = &[1];

/// Collections created by the schema
pub const COLLECTIONS: &[&str] = &["jobs", "sync_queue", "photos"];

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Whether a file was written by a newer build than this one
pub fn is_from_future(current_version: i32) -> bool {
    current_version > CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn get_pending_migrations(current_version: i32) -> Vec<i32> {
    MIGRATION_VERSIONS
        .iter()
        .filter(|&&v| v > current_version)
        .cloned()
        .collect()
}
