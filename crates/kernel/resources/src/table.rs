use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use hive_kernel_types::{Handle, TenantId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entry::{ResourceEntry, ResourceValue};
use crate::error::ResourceError;

/// Default upper bound on live entries.
pub const DEFAULT_MAX_SIZE: usize = 4096;

/// Counters describing table activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub live: usize,
    pub max_size: usize,
    /// Handles issued since construction (never reset).
    pub allocated_total: u64,
    pub dropped_total: u64,
}

#[derive(Default)]
struct TableState {
    /// Last issued handle number; 0 means none issued yet.
    last_handle: u64,
    entries: HashMap<Handle, ResourceEntry>,
    by_owner: HashMap<TenantId, BTreeSet<Handle>>,
    by_kind: HashMap<String, BTreeSet<Handle>>,
    dropped_total: u64,
}

impl TableState {
    fn index(&mut self, entry: &ResourceEntry) {
        self.by_owner
            .entry(entry.owner().clone())
            .or_default()
            .insert(entry.handle());
        self.by_kind
            .entry(entry.kind().to_string())
            .or_default()
            .insert(entry.handle());
    }

    fn unindex_owner(&mut self, owner: &TenantId, handle: Handle) {
        if let Some(set) = self.by_owner.get_mut(owner) {
            set.remove(&handle);
            if set.is_empty() {
                self.by_owner.remove(owner);
            }
        }
    }

    fn unindex_kind(&mut self, kind: &str, handle: Handle) {
        if let Some(set) = self.by_kind.get_mut(kind) {
            set.remove(&handle);
            if set.is_empty() {
                self.by_kind.remove(kind);
            }
        }
    }

    fn remove(&mut self, handle: Handle) -> Option<ResourceEntry> {
        let entry = self.entries.remove(&handle)?;
        self.unindex_owner(entry.owner(), handle);
        self.unindex_kind(entry.kind(), handle);
        self.dropped_total += 1;
        Some(entry)
    }
}

/// Bounded, handle-keyed store with per-entry ownership.
///
/// The table is the single source of truth for handle-backed resources across
/// all tenants. Every mutation runs under one lock, so handle issue and size
/// accounting are linearizable even on a multi-threaded runtime.
///
/// Invariants:
/// - `size() <= max_size()` at all times
/// - every live handle maps to exactly one entry
/// - owner and kind indices agree with the primary map after every mutation
/// - handle numbers are never reissued, even after `drop` or `clear`
pub struct ResourceTable {
    max_size: usize,
    state: Mutex<TableState>,
}

impl ResourceTable {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            state: Mutex::new(TableState::default()),
        }
    }

    /// Store `value` under a fresh handle owned by `owner`.
    pub fn allocate<T: Any + Send + Sync>(
        &self,
        kind: impl Into<String>,
        value: T,
        owner: impl Into<TenantId>,
    ) -> Result<Handle, ResourceError> {
        self.allocate_shared(kind, Arc::new(value), owner)
    }

    /// Like [`ResourceTable::allocate`] for a value that is already shared.
    pub fn allocate_shared(
        &self,
        kind: impl Into<String>,
        value: ResourceValue,
        owner: impl Into<TenantId>,
    ) -> Result<Handle, ResourceError> {
        let mut state = self.state.lock();

        if state.entries.len() >= self.max_size {
            warn!(max_size = self.max_size, "Resource table full, allocation refused");
            return Err(ResourceError::TableFull {
                max_size: self.max_size,
            });
        }

        state.last_handle += 1;
        let handle = Handle::from_raw(state.last_handle);
        let entry = ResourceEntry::new(handle, kind.into(), value, owner.into());

        state.index(&entry);
        debug!(%handle, kind = entry.kind(), owner = %entry.owner(), "Resource allocated");
        state.entries.insert(handle, entry);

        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Result<ResourceEntry, ResourceError> {
        self.state
            .lock()
            .entries
            .get(&handle)
            .cloned()
            .ok_or(ResourceError::HandleNotFound(handle))
    }

    /// Fetch an entry, refusing it unless it was allocated as `kind`.
    pub fn get_typed(&self, handle: Handle, kind: &str) -> Result<ResourceEntry, ResourceError> {
        let entry = self.get(handle)?;
        if entry.kind() != kind {
            return Err(ResourceError::HandleTypeMismatch {
                handle,
                expected: kind.to_string(),
                actual: entry.kind().to_string(),
            });
        }
        Ok(entry)
    }

    /// [`ResourceTable::get_typed`] followed by a downcast of the value.
    ///
    /// A value whose Rust type does not match `T` is reported as a kind
    /// mismatch too.
    pub fn get_as<T: Any + Send + Sync>(
        &self,
        handle: Handle,
        kind: &str,
    ) -> Result<Arc<T>, ResourceError> {
        let entry = self.get_typed(handle, kind)?;
        entry
            .downcast::<T>()
            .ok_or_else(|| ResourceError::HandleTypeMismatch {
                handle,
                expected: std::any::type_name::<T>().to_string(),
                actual: entry.kind().to_string(),
            })
    }

    /// Reassign ownership. Returns the previous owner.
    pub fn transfer(
        &self,
        handle: Handle,
        new_owner: impl Into<TenantId>,
    ) -> Result<TenantId, ResourceError> {
        let new_owner = new_owner.into();
        let mut state = self.state.lock();

        let previous = state
            .entries
            .get(&handle)
            .map(|e| e.owner().clone())
            .ok_or(ResourceError::HandleNotFound(handle))?;

        if previous == new_owner {
            return Ok(previous);
        }

        state.unindex_owner(&previous, handle);
        state
            .by_owner
            .entry(new_owner.clone())
            .or_default()
            .insert(handle);
        if let Some(entry) = state.entries.get_mut(&handle) {
            entry.set_owner(new_owner.clone());
        }

        debug!(%handle, from = %previous, to = %new_owner, "Resource transferred");
        Ok(previous)
    }

    /// Remove and return an entry.
    pub fn drop(&self, handle: Handle) -> Result<ResourceEntry, ResourceError> {
        let entry = self
            .state
            .lock()
            .remove(handle)
            .ok_or(ResourceError::HandleNotFound(handle))?;
        debug!(%handle, kind = entry.kind(), "Resource dropped");
        Ok(entry)
    }

    /// Remove every entry owned by `owner`, in allocation order.
    pub fn drop_owned_by(&self, owner: &TenantId) -> Vec<ResourceEntry> {
        let mut state = self.state.lock();
        let handles: Vec<Handle> = state
            .by_owner
            .get(owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let removed: Vec<ResourceEntry> = handles
            .into_iter()
            .filter_map(|h| state.remove(h))
            .collect();

        if !removed.is_empty() {
            debug!(%owner, count = removed.len(), "Released resources owned by tenant");
        }
        removed
    }

    pub fn list_by_owner(&self, owner: &TenantId) -> Vec<Handle> {
        self.state
            .lock()
            .by_owner
            .get(owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn list_by_type(&self, kind: &str) -> Vec<Handle> {
        self.state
            .lock()
            .by_kind
            .get(kind)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has(&self, handle: Handle) -> bool {
        self.state.lock().entries.contains_key(&handle)
    }

    pub fn size(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Snapshot of every live entry, ordered by handle.
    pub fn entries(&self) -> Vec<ResourceEntry> {
        let state = self.state.lock();
        let mut entries: Vec<ResourceEntry> = state.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.handle());
        entries
    }

    /// Owners holding at least one live entry.
    pub fn owners(&self) -> Vec<TenantId> {
        let mut owners: Vec<TenantId> = self.state.lock().by_owner.keys().cloned().collect();
        owners.sort();
        owners
    }

    /// Remove every entry. The handle counter keeps counting.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let live = state.entries.len() as u64;
        state.entries.clear();
        state.by_owner.clear();
        state.by_kind.clear();
        state.dropped_total += live;
        debug!(released = live, "Resource table cleared");
    }

    pub fn stats(&self) -> TableStats {
        let state = self.state.lock();
        TableStats {
            live: state.entries.len(),
            max_size: self.max_size,
            allocated_total: state.last_handle,
            dropped_total: state.dropped_total,
        }
    }

    /// Verify the size bound and index consistency.
    pub fn check_invariants(&self) -> Result<(), String> {
        let state = self.state.lock();

        if state.entries.len() > self.max_size {
            return Err(format!(
                "size {} exceeds max_size {}",
                state.entries.len(),
                self.max_size
            ));
        }

        let owner_indexed: usize = state.by_owner.values().map(BTreeSet::len).sum();
        let kind_indexed: usize = state.by_kind.values().map(BTreeSet::len).sum();
        if owner_indexed != state.entries.len() || kind_indexed != state.entries.len() {
            return Err(format!(
                "index sizes (owner {owner_indexed}, kind {kind_indexed}) disagree with {} entries",
                state.entries.len()
            ));
        }

        for (handle, entry) in &state.entries {
            if entry.handle() != *handle {
                return Err(format!("entry under {handle} reports handle {}", entry.handle()));
            }
            if handle.raw() == 0 || handle.raw() > state.last_handle {
                return Err(format!("handle {handle} was never issued"));
            }
            let owned = state
                .by_owner
                .get(entry.owner())
                .is_some_and(|set| set.contains(handle));
            let typed = state
                .by_kind
                .get(entry.kind())
                .is_some_and(|set| set.contains(handle));
            if !owned || !typed {
                return Err(format!("handle {handle} missing from a secondary index"));
            }
        }

        Ok(())
    }
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}
