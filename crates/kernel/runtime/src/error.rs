use hive_kernel_chaos::ChaosError;
use hive_kernel_platform::Interrupted;
use hive_kernel_registry::RegistryError;
use hive_kernel_resources::ResourceError;
use hive_kernel_stream::StreamError;
use hive_kernel_types::{Capability, ErrorCode, TenantId};
use thiserror::Error;

/// Capability checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("capability denied: {0}")]
    Denied(Capability),

    /// A tag outside the known set was requested at grant time.
    #[error("capability denied: unknown tag {0:?}")]
    Unknown(String),
}

impl CapabilityError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::CapabilityDenied
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("unknown signal: {0}")]
    UnknownSignal(String),
}

impl SignalError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SignalError::Interrupted(e) => e.code(),
            SignalError::UnknownSignal(_) => ErrorCode::NotFound,
        }
    }
}

/// Everything a kernel operation can fail with.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Chaos(#[from] ChaosError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("tenant not found: {0}")]
    TenantNotFound(TenantId),

    #[error("tenant already exists: {0}")]
    TenantExists(TenantId),

    /// The kernel has been shut down.
    ///
    /// Reported as `ESIGNAL`: `close` is the kernel-wide `SIGTERM`, and
    /// waiters cancelled by that signal see the same code.
    #[error("kernel closed")]
    Closed,

    #[error("configuration error: {0}")]
    Config(String),
}

impl KernelError {
    /// Stable code for callers to match on. Configuration errors have none.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            KernelError::Resource(e) => Some(e.code()),
            KernelError::Stream(e) => Some(e.code()),
            KernelError::Registry(e) => Some(e.code()),
            KernelError::Chaos(e) => Some(e.code()),
            KernelError::Capability(e) => Some(e.code()),
            KernelError::Signal(e) => Some(e.code()),
            KernelError::TenantNotFound(_) => Some(ErrorCode::NotFound),
            KernelError::TenantExists(_) => Some(ErrorCode::AlreadyExists),
            KernelError::Closed => Some(ErrorCode::Signal),
            KernelError::Config(_) => None,
        }
    }
}

impl From<Interrupted> for KernelError {
    fn from(e: Interrupted) -> Self {
        KernelError::Signal(SignalError::Interrupted(e))
    }
}

impl From<config::ConfigError> for KernelError {
    fn from(e: config::ConfigError) -> Self {
        KernelError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use hive_kernel_types::Handle;

    #[test]
    fn codes_follow_source_errors() {
        let err: KernelError = ResourceError::HandleNotFound(Handle::from_raw(3)).into();
        assert_eq!(err.code(), Some(ErrorCode::NoHandle));

        let err: KernelError = StreamError::Closed.into();
        assert_eq!(err.code(), Some(ErrorCode::StreamClosed));

        let err: KernelError = CapabilityError::Denied(Capability::Net).into();
        assert_eq!(err.code(), Some(ErrorCode::CapabilityDenied));
        assert_eq!(err.to_string(), "capability denied: net");

        let err: KernelError = Interrupted {
            reason: "SIGTERM".into(),
        }
        .into();
        assert_eq!(err.code(), Some(ErrorCode::Signal));
    }

    #[test]
    fn tenant_and_config_codes() {
        let id = TenantId::new("t1");
        assert_eq!(KernelError::TenantNotFound(id.clone()).code(), Some(ErrorCode::NotFound));
        assert_eq!(KernelError::TenantExists(id).code(), Some(ErrorCode::AlreadyExists));
        assert_eq!(KernelError::Config("bad".into()).code(), None);
        assert_eq!(CapabilityError::Unknown("root".into()).code(), ErrorCode::CapabilityDenied);
    }
}
