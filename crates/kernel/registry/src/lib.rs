//! Named service directory for the Hive Kernel.
//!
//! Local services carry a [`ServiceHandler`]; remote entries only name the
//! node that hosts them. Misses fall through to [`LookupHook`]s, which is how
//! cross-node discovery plugs in without the registry knowing about it.

pub mod error;
pub mod hook;
pub mod registry;
pub mod service;

pub use error::RegistryError;
pub use hook::{FnLookupHook, LookupHook};
pub use registry::ServiceRegistry;
pub use service::{FnHandler, RegisterOptions, ServiceEntry, ServiceHandler};
