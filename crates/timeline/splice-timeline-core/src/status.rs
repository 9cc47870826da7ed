//! Outcome codes for fallible operations on the object graph.

use thiserror::Error;

/// Error raised by graph mutation and value accessor operations.
///
/// Every fallible operation in this crate reports through `Result<_, Status>`
/// rather than an out-parameter, so `?` composes across call chains.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Status {
    #[error("illegal index {index} for collection of length {len}")]
    IllegalIndex { index: usize, len: usize },

    #[error("child is already a member of another composition")]
    ChildAlreadyParented,

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Status {
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Status::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
