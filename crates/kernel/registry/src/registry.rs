//! Service Registry - the kernel's named service directory

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hive_kernel_types::TenantId;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::hook::LookupHook;
use crate::service::{RegisterOptions, ServiceEntry, ServiceHandler};

/// Directory of named services, local and remote.
///
/// Names are unique across both kinds. Lookups that miss locally fall through
/// to the registered [`LookupHook`]s in registration order.
pub struct ServiceRegistry {
    services: DashMap<String, ServiceEntry>,
    hooks: RwLock<Vec<Arc<dyn LookupHook>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Register a local handler under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn ServiceHandler>,
        options: RegisterOptions,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let entry = ServiceEntry {
            name: name.clone(),
            handler: Some(handler),
            metadata: options.metadata,
            owner: options.owner,
            node: None,
        };
        self.insert_unique(entry)?;
        debug!(service = %name, "Service registered");
        Ok(())
    }

    /// Record that `name` lives on `node`. No local handler is attached.
    pub fn register_remote(
        &self,
        name: impl Into<String>,
        node: impl Into<String>,
        metadata: Value,
    ) -> Result<(), RegistryError> {
        let entry = ServiceEntry::remote(name, node).with_metadata(metadata);
        let (name, node) = (entry.name.clone(), entry.node.clone());
        self.insert_unique(entry)?;
        debug!(service = %name, node = ?node, "Remote service registered");
        Ok(())
    }

    fn insert_unique(&self, entry: ServiceEntry) -> Result<(), RegistryError> {
        match self.services.entry(entry.name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(entry.name)),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn unregister(&self, name: &str) -> Result<ServiceEntry, RegistryError> {
        let (_, entry) = self
            .services
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        debug!(service = %name, "Service unregistered");
        Ok(entry)
    }

    /// Local entry, or the first entry a lookup hook resolves.
    ///
    /// Hook results are returned to the caller but not cached.
    pub async fn lookup(&self, name: &str) -> Result<ServiceEntry, RegistryError> {
        if let Some(entry) = self.get_local(name) {
            return Ok(entry);
        }

        let hooks: Vec<Arc<dyn LookupHook>> = self.hooks.read().clone();
        for hook in hooks {
            if let Some(entry) = hook.resolve(name).await {
                debug!(service = %name, "Lookup resolved by hook");
                return Ok(entry);
            }
        }
        Err(RegistryError::NotFound(name.to_string()))
    }

    /// Local entry only; hooks are not consulted.
    pub fn get_local(&self, name: &str) -> Option<ServiceEntry> {
        self.services.get(name).map(|e| e.clone())
    }

    /// Look `name` up and call its local handler.
    pub async fn invoke(&self, name: &str, request: Value) -> Result<Value, RegistryError> {
        let entry = self.lookup(name).await?;
        match entry.handler {
            Some(handler) => Ok(handler.call(request).await),
            None => Err(RegistryError::RemoteOnly {
                name: entry.name,
                node: entry.node.unwrap_or_default(),
            }),
        }
    }

    pub fn add_lookup_hook(&self, hook: Arc<dyn LookupHook>) {
        self.hooks.write().push(hook);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// All entries, sorted by name.
    pub fn list(&self) -> Vec<ServiceEntry> {
        let mut entries: Vec<ServiceEntry> =
            self.services.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn list_by_owner(&self, owner: &TenantId) -> Vec<ServiceEntry> {
        self.list()
            .into_iter()
            .filter(|e| e.owner.as_ref() == Some(owner))
            .collect()
    }

    /// Remove every service owned by `owner`. Returns the removed names.
    pub fn unregister_owned_by(&self, owner: &TenantId) -> Vec<String> {
        let names: Vec<String> = self
            .list_by_owner(owner)
            .into_iter()
            .filter_map(|e| self.remove_owned(&e.name, owner))
            .collect();
        if !names.is_empty() {
            info!(tenant = %owner, count = names.len(), "Released tenant services");
        }
        names
    }

    /// Remove `name` only while `owner` still holds it; the name may have
    /// been re-registered by someone else since it was listed.
    fn remove_owned(&self, name: &str, owner: &TenantId) -> Option<String> {
        self.services
            .remove_if(name, |_, current| current.owner.as_ref() == Some(owner))
            .map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Drop every entry and hook.
    pub fn clear(&self) {
        self.services.clear();
        self.hooks.write().clear();
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.len())
            .field("hooks", &self.hook_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::FnLookupHook;
    use crate::service::FnHandler;
    use hive_kernel_types::ErrorCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn echo() -> Arc<dyn ServiceHandler> {
        Arc::new(FnHandler::new(|req: Value| async move { json!({ "echo": req }) }))
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = ServiceRegistry::new();
        registry
            .register("svcA", echo(), RegisterOptions::default().with_metadata(json!({ "v": 1 })))
            .unwrap();

        let entry = registry.lookup("svcA").await.unwrap();
        assert_eq!(entry.name, "svcA");
        assert_eq!(entry.metadata["v"], 1);
        assert!(!entry.is_remote());
    }

    #[test]
    fn owned_removal_skips_names_taken_over_by_another_owner() {
        let registry = ServiceRegistry::new();
        let first = TenantId::new("first");
        let second = TenantId::new("second");
        registry.register("svc", echo(), RegisterOptions::owned_by(first.clone())).unwrap();

        // Listed for `first`, then handed over before removal.
        registry.unregister("svc").unwrap();
        registry.register("svc", echo(), RegisterOptions::owned_by(second.clone())).unwrap();

        assert_eq!(registry.remove_owned("svc", &first), None);
        assert_eq!(registry.get_local("svc").unwrap().owner, Some(second.clone()));
        assert!(registry.unregister_owned_by(&first).is_empty());
        assert_eq!(registry.remove_owned("svc", &second), Some("svc".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let registry = ServiceRegistry::new();
        registry.register("svcA", echo(), RegisterOptions::default()).unwrap();

        let err = registry
            .register("svcA", echo(), RegisterOptions::default())
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered("svcA".into()));
        assert_eq!(err.code(), ErrorCode::AlreadyExists);

        let err = registry.register_remote("svcA", "node-2", Value::Null).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_missing_is_not_found() {
        let registry = ServiceRegistry::new();
        let err = registry.unregister("ghost").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        registry.register("svc", echo(), RegisterOptions::default()).unwrap();
        assert_eq!(registry.unregister("svc").unwrap().name, "svc");
        assert!(!registry.contains("svc"));
    }

    #[tokio::test]
    async fn local_hit_skips_hooks() {
        let registry = ServiceRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        registry.add_lookup_hook(Arc::new(FnLookupHook::new(move |_name: String| {
            counted.fetch_add(1, Ordering::SeqCst);
            async { None::<ServiceEntry> }
        })));
        registry.register("svc", echo(), RegisterOptions::default()).unwrap();

        registry.lookup("svc").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hooks_run_in_order_until_one_resolves() {
        let registry = ServiceRegistry::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for (label, resolves) in [("first", false), ("second", true), ("third", true)] {
            let order = order.clone();
            registry.add_lookup_hook(Arc::new(FnLookupHook::new(move |name: String| {
                order.lock().push(label);
                async move {
                    resolves.then(|| ServiceEntry::remote(name, label))
                }
            })));
        }

        let entry = registry.lookup("far").await.unwrap();
        assert_eq!(entry.node.as_deref(), Some("second"));
        assert_eq!(*order.lock(), vec!["first", "second"]);
        // hook results are not cached
        assert!(!registry.contains("far"));
    }

    #[tokio::test]
    async fn miss_with_no_resolving_hook_is_not_found() {
        let registry = ServiceRegistry::new();
        registry.add_lookup_hook(Arc::new(FnLookupHook::new(|_name: String| async {
            None::<ServiceEntry>
        })));

        let err = registry.lookup("nowhere").await.unwrap_err();
        assert_eq!(err, RegistryError::NotFound("nowhere".into()));
    }

    #[tokio::test]
    async fn invoke_calls_local_handler() {
        let registry = ServiceRegistry::new();
        registry.register("echo", echo(), RegisterOptions::default()).unwrap();

        let reply = registry.invoke("echo", json!("ping")).await.unwrap();
        assert_eq!(reply, json!({ "echo": "ping" }));
    }

    #[tokio::test]
    async fn invoke_remote_names_the_node() {
        let registry = ServiceRegistry::new();
        registry
            .register_remote("billing", "node-7", json!({ "region": "eu" }))
            .unwrap();

        let entry = registry.lookup("billing").await.unwrap();
        assert!(entry.is_remote());

        let err = registry.invoke("billing", Value::Null).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.to_string().contains("node-7"));
    }

    #[test]
    fn owner_cascade() {
        let registry = ServiceRegistry::new();
        let t1 = TenantId::new("t1");
        let t2 = TenantId::new("t2");
        registry.register("b", echo(), RegisterOptions::owned_by(t1.clone())).unwrap();
        registry.register("a", echo(), RegisterOptions::owned_by(t1.clone())).unwrap();
        registry.register("c", echo(), RegisterOptions::owned_by(t2.clone())).unwrap();

        let owned: Vec<String> = registry.list_by_owner(&t1).into_iter().map(|e| e.name).collect();
        assert_eq!(owned, vec!["a", "b"]);

        assert_eq!(registry.unregister_owned_by(&t1), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.list().len(), 1);
        assert!(registry.unregister_owned_by(&t1).is_empty());
    }

    #[test]
    fn clear_drops_entries_and_hooks() {
        let registry = ServiceRegistry::new();
        registry.register("a", echo(), RegisterOptions::default()).unwrap();
        registry.add_lookup_hook(Arc::new(FnLookupHook::new(|_name: String| async {
            None::<ServiceEntry>
        })));

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.hook_count(), 0);
    }
}
