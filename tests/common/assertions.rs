//! Custom assertion macros and utilities
//!
//! Provides enhanced assertion macros for better test output and
//! more descriptive error messages.

/// Assert that a result is ok and return the value
///
/// This macro unwraps a Result, providing a better error message
/// if the result is an error.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a drain walked its batch and return the report
#[macro_export]
macro_rules! assert_completed {
    ($outcome:expr) => {
        match $outcome {
            Ok(fieldsync::sync::DrainOutcome::Completed(report)) => report,
            other => panic!("Expected a completed drain, got {:?}", other),
        }
    };
}

/// Assert that a string contains a substring
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        match (&$haystack, &$needle) {
            (haystack, needle) => assert!(
                haystack.contains(*needle),
                "Expected '{}' to contain '{}'",
                haystack,
                needle
            ),
        }
    };
}
