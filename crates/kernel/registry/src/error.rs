use hive_kernel_types::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service already registered: {0}")]
    AlreadyRegistered(String),

    #[error("service not found: {0}")]
    NotFound(String),

    /// The name resolves to another node; there is no local handler to call.
    #[error("service {name} is registered on node {node}, not locally")]
    RemoteOnly { name: String, node: String },
}

impl RegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::AlreadyRegistered(_) => ErrorCode::AlreadyExists,
            RegistryError::NotFound(_) | RegistryError::RemoteOnly { .. } => ErrorCode::NotFound,
        }
    }
}
