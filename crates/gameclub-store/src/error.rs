//! Error types for the store adapter.

use thiserror::Error;

/// Errors that can occur when talking to the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached or refused the transaction.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A key holds a value of a different type than the operation expects.
    #[error("wrong type for key {key}: expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
    },

    /// A counter operation hit a value that is not an integer.
    #[error("value at {key} is not an integer: {value:?}")]
    NotAnInteger { key: String, value: String },

    /// A counter operation would leave the `i64` range.
    #[error("increment of {key} by {delta} would overflow")]
    Overflow { key: String, delta: i64 },

    /// A scan pattern could not be compiled.
    #[error("invalid scan pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
