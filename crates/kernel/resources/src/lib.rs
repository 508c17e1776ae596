//! Resource Table: the kernel's bounded, handle-keyed store.
//!
//! Every handle-backed resource of every tenant lives here. Tenant teardown
//! relies on the owner index to cascade-release whatever a tenant still holds.

pub mod entry;
pub mod error;
pub mod table;

pub use entry::{ResourceEntry, ResourceValue};
pub use error::ResourceError;
pub use table::{ResourceTable, TableStats, DEFAULT_MAX_SIZE};
