//! Assertions over `VivResult` for unit and `#[pg_test]` tests
#![cfg(any(test, feature = "pg_test"))]

use std::fmt::Debug;

use super::{VivError, VivResult};

/// Unwrap the error of a result that was expected to fail
///
/// # Panics
/// Panics if the operation succeeded.
pub fn expect_error<T: Debug>(result: VivResult<T>, expectation: &str) -> VivError {
    match result {
        Err(e) => e,
        Ok(v) => panic!("expected {expectation}, but the operation returned {v:?}"),
    }
}

/// # Panics
/// Panics unless the result failed with `expected_sqlstate`.
pub fn assert_error_sqlstate<T: Debug>(result: VivResult<T>, expected_sqlstate: &str) {
    let e = expect_error(result, &format!("SQLSTATE {expected_sqlstate}"));
    assert_eq!(e.sqlstate(), expected_sqlstate, "wrong error kind: {e}");
}

/// # Panics
/// Panics unless the error message contains `expected_substring`.
pub fn assert_error_contains<T: Debug>(result: VivResult<T>, expected_substring: &str) {
    let message = expect_error(result, &format!("an error mentioning '{expected_substring}'")).to_string();
    assert!(
        message.contains(expected_substring),
        "'{message}' does not mention '{expected_substring}'"
    );
}

/// # Panics
/// Panics unless the failure happened before any statement reached the backend.
pub fn assert_pre_ddl_error<T: Debug>(result: VivResult<T>) -> VivError {
    let e = expect_error(result, "a failure before DDL");
    assert!(e.is_pre_ddl(), "{} ({}) can follow issued DDL", e, e.sqlstate());
    e
}
