//! Integration tests
//!
//! Drive the sync manager end to end against an in-memory or on-disk
//! store and a recording remote.

pub mod connectivity_test;
pub mod drain_test;
pub mod provisioning_test;
pub mod retry_test;
pub mod store_test;
