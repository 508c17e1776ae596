//! # Hive Kernel
//!
//! A capability-secure, in-process microkernel. One [`Kernel`] owns the
//! shared subsystems and hosts any number of tenants:
//!
//! - **Resources**: bounded, handle-keyed [`ResourceTable`] with ownership
//!   and cascade release on tenant teardown
//! - **Streams**: pipes, transform composition, `dev_null` and message ports
//! - **Observability**: ring-buffered [`Tracer`] and [`Logger`] with live
//!   subscriptions
//! - **Chaos**: seeded fault injection through [`ChaosEngine`]
//! - **Services**: named directory with remote entries and lookup hooks
//! - **Capabilities**: immutable per-tenant [`Caps`]; every gated call goes
//!   through [`require_cap`]
//! - **Signals**: kernel-wide and per-tenant [`SignalController`]s
//!
//! ```no_run
//! use hive_kernel::{require_cap, Capability, Kernel, TenantOptions};
//!
//! # fn main() -> Result<(), hive_kernel::KernelError> {
//! let kernel = Kernel::new()?;
//! let tenant = kernel.create_tenant(TenantOptions::new().grant("clock").grant("net"))?;
//! require_cap(&tenant.caps, Capability::Net)?;
//! kernel.destroy_tenant(&tenant.id)?;
//! kernel.close();
//! # Ok(())
//! # }
//! ```

pub mod caps;
pub mod config;
pub mod error;
pub mod kernel;
pub mod signal;
pub mod stdio;
pub mod telemetry;
pub mod tenant;

pub use caps::{build_caps, require_cap, Caps, Subsystems};
pub use config::{
    KernelConfig, LoggerConfig, LoggingConfig, ResourceConfig, StreamConfig, TracerConfig,
};
pub use error::{CapabilityError, KernelError, Result, SignalError};
pub use kernel::{
    Kernel, KernelBuilder, TenantTeardown, TRACE_TENANT_CREATED, TRACE_TENANT_DESTROYED,
    TRACE_TENANT_REGRANTED,
};
pub use signal::{HandlerId, Signal, SignalController};
pub use stdio::{HostStdio, Stdio, StdioOptions};
pub use telemetry::init_tracing;
pub use tenant::{Tenant, TenantOptions};

pub use hive_kernel_chaos::{ChaosConfig, ChaosEngine, ChaosError, ChaosStats};
pub use hive_kernel_observe::{
    LogEntry, LogFilter, LogLevel, Logger, ModuleLogger, Subscription, TraceEvent, TraceRecord,
    Tracer,
};
pub use hive_kernel_platform::{
    sleep_or_abort, AbortController, AbortSignal, Clock, EntropyRng, Environment, Interrupted,
    ManualClock, RandomSource, SeededRng, SystemClock,
};
pub use hive_kernel_registry::{
    FnHandler, FnLookupHook, LookupHook, RegisterOptions, RegistryError, ServiceEntry,
    ServiceHandler, ServiceRegistry,
};
pub use hive_kernel_resources::{ResourceEntry, ResourceError, ResourceTable, TableStats};
pub use hive_kernel_stream::{
    as_byte_stream, compose, create_channel, create_pipe, dev_null, pump, ByteStream,
    ChunkTransform, FnTransform, PipeEnd, Port, SharedStream, StreamError,
};
pub use hive_kernel_types::{Capability, ErrorCode, Handle, TenantId};
