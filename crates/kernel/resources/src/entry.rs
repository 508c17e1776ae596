use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hive_kernel_types::{Handle, TenantId};

/// Opaque value stored behind a handle.
pub type ResourceValue = Arc<dyn Any + Send + Sync>;

/// One Resource Table entry.
///
/// Kind and value are fixed at allocation; only the owner changes, and only
/// through [`crate::ResourceTable::transfer`].
#[derive(Clone)]
pub struct ResourceEntry {
    handle: Handle,
    kind: String,
    value: ResourceValue,
    owner: TenantId,
}

impl ResourceEntry {
    pub(crate) fn new(handle: Handle, kind: String, value: ResourceValue, owner: TenantId) -> Self {
        Self {
            handle,
            kind,
            value,
            owner,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn owner(&self) -> &TenantId {
        &self.owner
    }

    pub fn value(&self) -> &ResourceValue {
        &self.value
    }

    /// Downcast the stored value.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub(crate) fn set_owner(&mut self, owner: TenantId) {
        self.owner = owner;
    }
}

impl fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
