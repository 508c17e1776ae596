use hive_kernel_platform::Interrupted;
use hive_kernel_types::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChaosError {
    /// An injected delay was cancelled before it elapsed.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl ChaosError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ChaosError::Interrupted(e) => e.code(),
        }
    }
}
