//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A recording `RemoteService` mock with failure injection
//! - Store and sync manager fixtures
//! - Custom assertion macros

pub mod assertions;
pub mod fixtures;

// Re-export commonly used utilities
pub use fixtures::*;
pub use mock_remote::*;
