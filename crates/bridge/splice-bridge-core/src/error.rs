//! Failures raised while crossing the bridge.
//!
//! Everything host-facing reports a [`BridgeError`]; native [`Status`] codes
//! are translated at the boundary so embeddings see one taxonomy.

use splice_timeline_core::Status;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum BridgeError {
    /// A native value has no host representation.
    #[error("unable to convert native value to a host value: {detail}")]
    UnsupportedType { detail: String },

    /// A host value has no native representation.
    #[error("host value of type '{type_name}' has no native representation")]
    UnsupportedValue { type_name: String },

    /// A host object used a non-string property key where a dictionary was
    /// expected.
    #[error("dictionary keys must be strings, got a {key_type} key")]
    KeyType { key_type: String },

    #[error("index {index} out of range for sequence of length {len}")]
    Index { index: i64, len: usize },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Domain-rule violation on the native side, e.g. inserting an already
    /// parented child.
    #[error("{0}")]
    Value(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn unsupported_type(detail: impl Into<String>) -> Self {
        BridgeError::UnsupportedType {
            detail: detail.into(),
        }
    }

    pub fn unsupported_value(type_name: impl Into<String>) -> Self {
        BridgeError::UnsupportedValue {
            type_name: type_name.into(),
        }
    }
}

impl From<Status> for BridgeError {
    fn from(status: Status) -> Self {
        match status {
            // Saturates rather than wrapping; the reported position loses
            // precision only past i64::MAX.
            Status::IllegalIndex { index, len } => BridgeError::Index {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                len,
            },
            Status::ChildAlreadyParented => {
                BridgeError::Value("child is already a member of another composition".into())
            }
            Status::TypeMismatch { expected, actual } => {
                BridgeError::TypeMismatch { expected, actual }
            }
            Status::Internal(message) => BridgeError::Internal(message),
        }
    }
}
