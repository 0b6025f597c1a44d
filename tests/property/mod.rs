//! Property-based tests

pub mod queue_proptest;
