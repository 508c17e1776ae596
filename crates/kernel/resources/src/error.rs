use hive_kernel_types::{ErrorCode, Handle};
use thiserror::Error;

/// Errors from Resource Table operations.
///
/// A failed operation never mutates the table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("handle not found: {0}")]
    HandleNotFound(Handle),

    #[error("handle {handle} holds a `{actual}` resource, expected `{expected}`")]
    HandleTypeMismatch {
        handle: Handle,
        expected: String,
        actual: String,
    },

    #[error("resource table full ({max_size} entries)")]
    TableFull { max_size: usize },
}

impl ResourceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResourceError::HandleNotFound(_) => ErrorCode::NoHandle,
            ResourceError::HandleTypeMismatch { .. } => ErrorCode::HandleType,
            ResourceError::TableFull { .. } => ErrorCode::TableFull,
        }
    }
}
