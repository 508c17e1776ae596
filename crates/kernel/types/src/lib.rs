//! Shared types for the Hive Kernel.
//!
//! Every kernel crate depends on this one for:
//! - `ErrorCode`: the stable codes callers pattern-match on
//! - `TenantId` / `Handle`: the identifiers used across ownership boundaries
//! - `Capability`: the tags that gate access to kernel subsystems

pub mod capability;
pub mod code;
pub mod ids;

pub use capability::{Capability, UnknownCapability, WILDCARD};
pub use code::ErrorCode;
pub use ids::{Handle, TenantId};
