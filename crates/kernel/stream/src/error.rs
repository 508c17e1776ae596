use hive_kernel_types::ErrorCode;
use thiserror::Error;

/// Errors from stream and port operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream closed")]
    Closed,

    #[error("port closed")]
    PortClosed,
}

impl StreamError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StreamError::Closed | StreamError::PortClosed => ErrorCode::StreamClosed,
        }
    }
}
